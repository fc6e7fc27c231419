use std::{cell::Cell, rc::Rc};

use danmaku_core::{Pool, PoolConfig};

#[derive(Debug)]
struct Bullet {
    serial: u32,
    live_frames: u32,
}

fn bullet_pool(initial: usize, max: Option<usize>) -> (Pool<Bullet>, Rc<Cell<u32>>) {
    let constructed = Rc::new(Cell::new(0));
    let counter = Rc::clone(&constructed);
    let pool = Pool::new(
        PoolConfig::new(initial, max),
        move || {
            let serial = counter.get();
            counter.set(serial + 1);
            Bullet {
                serial,
                live_frames: 0,
            }
        },
        |bullet: &mut Bullet| bullet.live_frames = 0,
    );
    (pool, constructed)
}

#[test]
fn capped_pool_signals_backpressure_instead_of_failing() {
    let (mut pool, constructed) = bullet_pool(1, Some(3));

    let first = pool.acquire().expect("first acquire");
    let second = pool.acquire().expect("second acquire");
    let third = pool.acquire().expect("third acquire");
    assert!(pool.acquire().is_none(), "fourth acquire should hit the cap");
    assert_eq!(constructed.get(), 3);

    let stats = pool.stats();
    assert_eq!(stats.size, 3);
    assert_eq!(stats.in_use, 3);
    assert_eq!(stats.free, 0);
    assert_eq!(stats.max, Some(3));
    assert!(stats.created <= 3);

    assert!(pool.release(first));
    let reused = pool.acquire().expect("reuse after release");
    assert_eq!(reused, first, "released slot should be handed out again");
    assert_eq!(constructed.get(), 3, "reuse must not construct");

    assert_ne!(second, third);
}

#[test]
fn release_resets_the_object() {
    let (mut pool, _) = bullet_pool(0, None);
    let slot = pool.acquire().expect("unbounded pool");
    pool.get_mut(slot).expect("in use").live_frames = 40;
    let serial = pool.get(slot).expect("in use").serial;

    assert!(pool.release(slot));
    assert!(pool.get(slot).is_none(), "released objects are not reachable");

    let again = pool.acquire().expect("reuse");
    let bullet = pool.get(again).expect("in use");
    assert_eq!(bullet.serial, serial);
    assert_eq!(bullet.live_frames, 0);
}

#[test]
fn double_release_is_ignored() {
    let (mut pool, _) = bullet_pool(1, Some(1));
    let slot = pool.acquire().expect("acquire");
    assert!(pool.release(slot));
    assert!(!pool.release(slot));
    assert_eq!(pool.stats().free, 1);
}

#[test]
fn preallocate_respects_capacity() {
    let (mut pool, constructed) = bullet_pool(0, Some(4));
    assert_eq!(pool.preallocate(10), 4);
    assert_eq!(constructed.get(), 4);
    assert_eq!(pool.stats().free, 4);
    assert_eq!(pool.preallocate(1), 0);
}
