//! End-to-end scenarios exercising the full stack: tasks, channels,
//! `select`, timers, and tickers working together.

use relay::chan::select::Select;
use relay::{chan, task, time};
use std::sync::mpsc;
use std::time::Duration;

/// S1 - Ping-pong. Two tasks, channels A (cap 0) and B (cap 0). Task1
/// sends 1..5 on A, receives echo on B. Task2 loops: r := A.recv();
/// B.send(r*10). Task1 should observe 10,20,30,40,50 on B in order.
#[test]
fn s1_ping_pong() {
    let a = chan::make::<i32>(0);
    let b = chan::make::<i32>(0);

    {
        let a = a.clone();
        let b = b.clone();
        task::spawn(move || {
            while let Some(v) = a.recv() {
                b.send(v * 10);
            }
        });
    }

    let mut echoes = Vec::new();
    for i in 1..=5 {
        a.send(i);
        echoes.push(b.recv().unwrap());
    }
    assert_eq!(echoes, vec![10, 20, 30, 40, 50]);
}

/// S2 - Closed drain. Channel C cap 3. Main sends 7, 8, 9 then closes.
/// Another task performs recv_ in a loop until ok=false. Expected
/// sequence: (7,true),(8,true),(9,true),(0,false),(0,false)...
#[test]
fn s2_closed_drain() {
    let c = chan::make::<i32>(3);
    c.send(7);
    c.send(8);
    c.send(9);
    c.close();

    let (tx, rx) = mpsc::channel();
    let receiver = c.clone();
    task::spawn(move || {
        let mut observed = Vec::new();
        loop {
            let (v, ok) = receiver.recv_();
            observed.push((v, ok));
            if !ok {
                if observed.len() >= 5 {
                    break;
                }
            }
        }
        let _ = tx.send(observed);
    });

    let observed = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(
        observed,
        vec![
            (Some(7), true),
            (Some(8), true),
            (Some(9), true),
            (None, false),
            (None, false),
        ]
    );
}

/// S3 - Select default. Channel C cap 0, no sender. select(C.recv,
/// default) returns (1, none) immediately.
#[test]
fn s3_select_default() {
    let c = chan::make::<i32>(0);
    let mut sel = Select::new();
    sel.recv(&c);
    let default_case = sel.default();

    let started = std::time::Instant::now();
    let op = sel.select();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(op.index(), default_case);
    assert!(op.is_default());
}

/// S4 - Select random. Channels A, B cap 1, both pre-filled with "a",
/// "b". select(A.recv, B.recv) run 10000 times each with a fresh pair;
/// count of case-0 wins in [4500, 5500].
#[test]
fn s4_select_random_fairness() {
    const TRIALS: u32 = 10_000;
    let mut case0_wins = 0u32;

    for _ in 0..TRIALS {
        let a = chan::make::<&str>(1);
        let b = chan::make::<&str>(1);
        a.send("a");
        b.send("b");

        let mut sel = Select::new();
        let a_case = sel.recv(&a);
        sel.recv(&b);
        let op = sel.select();
        if op.index() == a_case {
            case0_wins += 1;
        }
    }

    assert!(
        (4500..=5500).contains(&case0_wins),
        "case-0 won {case0_wins} of {TRIALS} trials"
    );
}

/// S5 - Timer stop. t = timer_after(1.0); after 0.1s, t.stop() returns
/// true; after another 2.0s, len(t.c) == 0.
#[test]
fn s5_timer_stop() {
    let t = time::Timer::new(1.0);
    std::thread::sleep(Duration::from_millis(100));
    assert!(t.stop());

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(t.channel().len(), 0);
}

/// S6 - Ticker drop. tk = ticker(0.01); sleep 0.2s without receiving;
/// then drain tk.c - exactly one value is available; stop leaves it
/// empty.
#[test]
fn s6_ticker_drop() {
    let tk = time::ticker(0.01);
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(tk.channel().len(), 1);
    tk.stop();
    assert_eq!(tk.channel().len(), 0);
}
