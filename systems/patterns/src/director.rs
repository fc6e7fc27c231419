use std::{cell::Cell, rc::Rc};

use danmaku_core::{BossSummary, Event, EventKind, RunSummary, System, TickContext};
use serde::{Deserialize, Serialize};

use crate::{Pattern, PatternCatalog, PatternError, PatternSelection};

const DIRECTOR_ID: &str = "pattern-director";

/// Settings for a [`PatternDirector`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorConfig {
    wave_threshold: u32,
    selection: PatternSelection,
    #[serde(default)]
    order: i32,
}

impl DirectorConfig {
    /// Starts a session once wave `wave_threshold` has been announced.
    #[must_use]
    pub const fn new(wave_threshold: u32, selection: PatternSelection) -> Self {
        Self {
            wave_threshold,
            selection,
            order: 0,
        }
    }

    /// Overrides the scheduler sort key.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Lowest wave number that triggers the session.
    #[must_use]
    pub const fn wave_threshold(&self) -> u32 {
        self.wave_threshold
    }

    /// How the opening pattern is chosen.
    #[must_use]
    pub const fn selection(&self) -> &PatternSelection {
        &self.selection
    }
}

/// Shared flag used to stop the active pattern from outside the scheduler.
///
/// The request is observed at the director's next update. Requests made while
/// no pattern is active are discarded.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Rc<Cell<bool>>);

impl AbortHandle {
    /// Requests that the active pattern be aborted.
    pub fn abort(&self) {
        self.0.set(true);
    }

    /// Whether an abort request is pending.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.get()
    }

    fn take(&self) -> bool {
        self.0.replace(false)
    }
}

/// System that runs at most one pattern session per run.
///
/// The session opens once a `WaveStarted` event at or above the configured
/// threshold has been observed. The highest wave seen is reported as the
/// summary wave and read back on restore, so a snapshot taken between the
/// threshold wave and the opening tick still opens the session. Each tick the active pattern is updated, its
/// state and generator consumption are recorded into the boss summary, and on
/// completion it either hands over to a declared successor or concludes the
/// session.
pub struct PatternDirector {
    config: DirectorConfig,
    catalog: PatternCatalog,
    opening: Option<String>,
    highest_wave: Rc<Cell<u32>>,
    abort: AbortHandle,
    active: Option<Box<dyn Pattern>>,
    session: BossSummary,
}

impl PatternDirector {
    /// Creates a director that draws patterns from `catalog`.
    #[must_use]
    pub fn new(config: DirectorConfig, catalog: PatternCatalog) -> Self {
        Self {
            config,
            catalog,
            opening: None,
            highest_wave: Rc::new(Cell::new(0)),
            abort: AbortHandle::default(),
            active: None,
            session: BossSummary::default(),
        }
    }

    /// Handle that aborts the active pattern at the next update.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Boss fields of the current or last session.
    #[must_use]
    pub const fn session(&self) -> &BossSummary {
        &self.session
    }

    /// Identifier of the running pattern, if any.
    #[must_use]
    pub fn active_pattern(&self) -> Option<&str> {
        self.active.as_deref().map(|pattern| pattern.id())
    }

    /// Reinstates a session recorded in a snapshot.
    ///
    /// An active session re-instantiates its pattern from the catalog and hands
    /// it the stored state. Chain payloads are not replayed; a successor that
    /// depends on its payload must carry what it needs in its own state.
    pub fn restore_session(&mut self, boss: &BossSummary) -> anyhow::Result<()> {
        self.active = None;
        self.session = boss.clone();
        if !boss.boss_active {
            return Ok(());
        }

        let id = boss
            .boss_pattern_id
            .as_deref()
            .ok_or(PatternError::CorruptSession {
                reason: "active session without a pattern id",
            })?;
        let mut pattern = self.catalog.instantiate(id, None)?;
        if let Some(expected) = boss.boss_pattern_version {
            if expected != pattern.version() {
                return Err(PatternError::VersionMismatch {
                    pattern: id.to_owned(),
                    expected,
                    actual: pattern.version(),
                }
                .into());
            }
        }
        if let Some(state) = boss.boss_pattern_state.clone() {
            pattern.restore_state(state)?;
        }
        log::debug!("restored pattern `{id}` session");
        self.active = Some(pattern);
        Ok(())
    }

    fn open_session(&mut self, ctx: &mut TickContext<'_>) -> anyhow::Result<()> {
        let id = match &self.opening {
            Some(id) => id.clone(),
            None => self.catalog.resolve(&self.config.selection)?,
        };
        let mut pattern = self.catalog.instantiate(&id, None)?;
        pattern.start(ctx)?;

        let frame = ctx.frame();
        log::info!("pattern `{id}` started at frame {frame}");
        self.session = BossSummary {
            boss_active: true,
            boss_pattern_id: Some(id.clone()),
            boss_pattern_version: Some(pattern.version()),
            boss_start_frame: Some(frame),
            boss_pattern_state: pattern.serialize_state(),
            ..BossSummary::default()
        };
        self.active = Some(pattern);
        ctx.emit(Event::PatternStarted { pattern: id, frame });
        Ok(())
    }

    fn close_session(&mut self, pattern: &str, frame: u64, aborted: bool) {
        self.active = None;
        self.session.boss_active = false;
        self.session.boss_end_frame = Some(frame);
        self.session.boss_aborted = aborted;
        if aborted {
            log::info!("pattern `{pattern}` aborted at frame {frame}");
        } else {
            log::info!("pattern `{pattern}` ended at frame {frame}");
        }
    }
}

impl System for PatternDirector {
    fn id(&self) -> &str {
        DIRECTOR_ID
    }

    fn order(&self) -> i32 {
        self.config.order
    }

    fn init(&mut self, ctx: &mut TickContext<'_>) -> anyhow::Result<()> {
        self.opening = Some(self.catalog.resolve(&self.config.selection)?);
        let highest_wave = Rc::clone(&self.highest_wave);
        let _ = ctx.on(EventKind::WaveStarted, move |event| {
            if let Event::WaveStarted { wave } = event {
                highest_wave.set(highest_wave.get().max(*wave));
            }
            Ok(())
        });
        Ok(())
    }

    fn update(&mut self, dt: f64, ctx: &mut TickContext<'_>) -> anyhow::Result<()> {
        let mut abort_requested = self.abort.take();

        if self.active.is_none() {
            if abort_requested {
                log::debug!("discarding abort request with no active pattern");
                abort_requested = false;
            }
            let triggered = self.session.boss_start_frame.is_some();
            if triggered || self.highest_wave.get() < self.config.wave_threshold {
                return Ok(());
            }
            self.open_session(ctx)?;
        }

        let Some(mut pattern) = self.active.take() else {
            return Ok(());
        };
        let frame = ctx.frame();
        let id = pattern.id().to_owned();

        if abort_requested {
            pattern.abort();
            pattern.end(ctx)?;
            self.close_session(&id, frame, true);
            ctx.emit(Event::PatternAborted { pattern: id, frame });
            return Ok(());
        }

        let before = ctx.rng().draws();
        let outcome = pattern.update(dt, ctx);
        let used = ctx.rng().draws().saturating_sub(before);
        *self.session.boss_rng_draws.entry(id.clone()).or_default() += used;
        let done = outcome?;

        if let Some(state) = pattern.serialize_state() {
            self.session.boss_pattern_state = Some(state);
        }
        if !done {
            self.active = Some(pattern);
            return Ok(());
        }

        pattern.end(ctx)?;
        match pattern.chain() {
            Some(chain) => {
                let mut next = self
                    .catalog
                    .instantiate(&chain.next, chain.payload.as_ref())?;
                next.start(ctx)?;
                log::info!("pattern `{id}` chained to `{}` at frame {frame}", chain.next);
                self.session.boss_pattern_id = Some(chain.next.clone());
                self.session.boss_pattern_version = Some(next.version());
                self.session.boss_pattern_state = next.serialize_state();
                self.active = Some(next);
                ctx.emit(Event::PatternChained {
                    from: id,
                    to: chain.next,
                    frame,
                    payload: chain.payload,
                });
            }
            None => {
                self.close_session(&id, frame, false);
                ctx.emit(Event::PatternEnded { pattern: id, frame });
            }
        }
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(pattern) = self.active.as_mut() {
            pattern.abort();
        }
        self.active = None;
    }

    fn summarize(&self, summary: &mut RunSummary) {
        summary.wave = summary.wave.max(self.highest_wave.get());
        *summary.boss_mut() = self.session.clone();
    }

    fn restore_summary(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
        self.highest_wave
            .set(self.highest_wave.get().max(summary.wave));
        match &summary.boss {
            Some(boss) => self.restore_session(boss),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for PatternDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternDirector")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("active", &self.active_pattern())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
