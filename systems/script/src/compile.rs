//! Flattens a step tree into indexed blocks the interpreter walks with a
//! program counter.

use sha2::{Digest, Sha256};

use crate::step::{Action, Predicate, Step, StepKind};

/// Instruction with callbacks replaced by indices and nested programs
/// replaced by block ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Node {
    Wait { frames: u32 },
    Do { action: usize },
    If { predicate: usize, then: usize, otherwise: usize },
    LoopUntil { predicate: usize, body: usize },
    Fork { branches: Vec<usize> },
    Join { token: u32 },
}

impl Node {
    pub(crate) const fn kind(&self) -> StepKind {
        match self {
            Self::Wait { .. } => StepKind::Wait,
            Self::Do { .. } => StepKind::Do,
            Self::If { .. } => StepKind::If,
            Self::LoopUntil { .. } => StepKind::LoopUntil,
            Self::Fork { .. } => StepKind::Fork,
            Self::Join { .. } => StepKind::Join,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Instruction {
    pub(crate) node: Node,
    pub(crate) label: Option<String>,
}

/// Immutable compiled program. Block 0 is the entry point.
#[derive(Debug)]
pub(crate) struct Code {
    blocks: Vec<Vec<Instruction>>,
    fingerprint: u64,
}

impl Code {
    pub(crate) fn block(&self, id: usize) -> Option<&[Instruction]> {
        self.blocks.get(id).map(Vec::as_slice)
    }

    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) const fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// Callbacks extracted from the step tree, addressed by the indices in [`Node`].
pub(crate) struct Callbacks {
    pub(crate) actions: Vec<Action>,
    pub(crate) predicates: Vec<Predicate>,
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("actions", &self.actions.len())
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

pub(crate) fn compile(steps: Vec<Step>) -> (Code, Callbacks) {
    let mut compiler = Compiler {
        blocks: Vec::new(),
        callbacks: Callbacks {
            actions: Vec::new(),
            predicates: Vec::new(),
        },
    };
    let _ = compiler.block(steps);
    let fingerprint = fingerprint(&compiler.blocks);
    (
        Code {
            blocks: compiler.blocks,
            fingerprint,
        },
        compiler.callbacks,
    )
}

struct Compiler {
    blocks: Vec<Vec<Instruction>>,
    callbacks: Callbacks,
}

impl Compiler {
    fn block(&mut self, steps: Vec<Step>) -> usize {
        let id = self.blocks.len();
        self.blocks.push(Vec::new());
        let instructions = steps.into_iter().map(|step| self.step(step)).collect();
        self.blocks[id] = instructions;
        id
    }

    fn step(&mut self, step: Step) -> Instruction {
        match step {
            Step::Wait { frames, label } => Instruction {
                node: Node::Wait { frames },
                label,
            },
            Step::Do { action, label } => {
                self.callbacks.actions.push(action);
                Instruction {
                    node: Node::Do {
                        action: self.callbacks.actions.len() - 1,
                    },
                    label,
                }
            }
            Step::If {
                predicate,
                then,
                otherwise,
                label,
            } => {
                let predicate = self.predicate(predicate);
                let then = self.block(then);
                let otherwise = self.block(otherwise);
                Instruction {
                    node: Node::If {
                        predicate,
                        then,
                        otherwise,
                    },
                    label,
                }
            }
            Step::LoopUntil {
                predicate,
                body,
                label,
            } => {
                let predicate = self.predicate(predicate);
                let body = self.block(body);
                Instruction {
                    node: Node::LoopUntil { predicate, body },
                    label,
                }
            }
            Step::Fork { branches, label } => {
                let branches = branches
                    .into_iter()
                    .map(|branch| self.block(branch))
                    .collect();
                Instruction {
                    node: Node::Fork { branches },
                    label,
                }
            }
            Step::Join { token, label } => Instruction {
                node: Node::Join { token },
                label,
            },
        }
    }

    fn predicate(&mut self, predicate: Predicate) -> usize {
        self.callbacks.predicates.push(predicate);
        self.callbacks.predicates.len() - 1
    }
}

/// Structural digest over block layout, parameters and labels.
fn fingerprint(blocks: &[Vec<Instruction>]) -> u64 {
    let mut hasher = Sha256::new();
    for (id, block) in blocks.iter().enumerate() {
        hasher.update((id as u64).to_le_bytes());
        hasher.update((block.len() as u64).to_le_bytes());
        for instruction in block {
            match &instruction.node {
                Node::Wait { frames } => {
                    hasher.update([0_u8]);
                    hasher.update(frames.to_le_bytes());
                }
                Node::Do { action } => {
                    hasher.update([1_u8]);
                    hasher.update((*action as u64).to_le_bytes());
                }
                Node::If {
                    predicate,
                    then,
                    otherwise,
                } => {
                    hasher.update([2_u8]);
                    for value in [predicate, then, otherwise] {
                        hasher.update((*value as u64).to_le_bytes());
                    }
                }
                Node::LoopUntil { predicate, body } => {
                    hasher.update([3_u8]);
                    hasher.update((*predicate as u64).to_le_bytes());
                    hasher.update((*body as u64).to_le_bytes());
                }
                Node::Fork { branches } => {
                    hasher.update([4_u8]);
                    hasher.update((branches.len() as u64).to_le_bytes());
                    for branch in branches {
                        hasher.update((*branch as u64).to_le_bytes());
                    }
                }
                Node::Join { token } => {
                    hasher.update([5_u8]);
                    hasher.update(token.to_le_bytes());
                }
            }
            match &instruction.label {
                Some(label) => {
                    hasher.update([1_u8]);
                    hasher.update((label.len() as u64).to_le_bytes());
                    hasher.update(label.as_bytes());
                }
                None => hasher.update([0_u8]),
            }
        }
    }
    finalize_fingerprint(hasher)
}

fn finalize_fingerprint(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{do_step, fork, if_step, wait};

    fn program(frames: u32) -> Vec<Step> {
        vec![
            do_step(|_| Ok(())).labeled("open"),
            if_step(|_| true, vec![wait(frames)], vec![]),
            fork(vec![vec![wait(1)], vec![do_step(|_| Ok(()))]]),
        ]
    }

    #[test]
    fn nested_programs_become_separate_blocks() {
        let (code, callbacks) = compile(program(2));

        // entry, then, otherwise, two fork branches
        assert_eq!(code.block_count(), 5);
        assert_eq!(callbacks.actions.len(), 2);
        assert_eq!(callbacks.predicates.len(), 1);
        assert_eq!(
            code.block(0).map(|block| block[1].node.clone()),
            Some(Node::If {
                predicate: 0,
                then: 1,
                otherwise: 2
            })
        );
    }

    #[test]
    fn fingerprint_tracks_structure_not_callbacks() {
        let (first, _) = compile(program(2));
        let (second, _) = compile(program(2));
        let (changed, _) = compile(program(3));
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_ne!(first.fingerprint(), changed.fingerprint());
    }
}
