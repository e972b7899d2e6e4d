//! 取消与监听者注册。
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pn_reach::config::SearchConfig;
use pn_reach::net::{Net, Place, Transition};
use pn_reach::search::{Controller, EventLog, FnListener, SearchEvent, SearchRequest, Status};

/// 每次发射多产生一个托肯，可达图无限。
fn generator() -> Net {
    let mut net = Net::empty();
    let p = net.add_place(Place::new_with_tokens("p", 1));
    let t = net.add_transition(Transition::new("t"));
    net.add_input_arc(p, t, 1).unwrap();
    net.add_output_arc(p, t, 2).unwrap();
    net
}

fn endless_search() -> Controller {
    let net = generator();
    let config = SearchConfig {
        progress_interval: 1,
        ..SearchConfig::default()
    };
    Controller::start(&net, &SearchRequest::exhaustive(&net), "FullReach", None)
        .unwrap()
        .with_config(config)
}

#[test]
fn stop_leaves_at_most_one_aborted() {
    let mut controller = endless_search();
    let log = Arc::new(EventLog::new());
    controller.add_listener(log.clone());
    let events = controller.subscribe();
    controller.run().unwrap();

    while !matches!(events.recv().unwrap(), SearchEvent::Progress { .. }) {}
    controller.stop_algorithm();
    let seen = log.events().len();

    let outcome = controller.join().unwrap();
    assert_eq!(outcome.status, Status::Aborted);
    assert!(outcome.backtrack.is_none());

    let all = log.events();
    let late = &all[seen..];
    assert!(late.len() <= 1);
    assert!(late.iter().all(|event| matches!(event, SearchEvent::Aborted { .. })));
    assert_eq!(all.iter().filter(|event| event.is_terminal()).count(), 1);
    assert!(matches!(log.terminal(), Some(SearchEvent::Aborted { .. })));
    assert_eq!(all.first(), Some(&SearchEvent::Started));
}

#[test]
fn stop_after_completion_changes_nothing() {
    let mut net = Net::empty();
    let p = net.add_place(Place::new_with_tokens("p", 1));
    let q = net.add_place(Place::new("q"));
    let t = net.add_transition(Transition::new("t"));
    net.add_input_arc(p, t, 1).unwrap();
    net.add_output_arc(q, t, 1).unwrap();

    let mut controller =
        Controller::start(&net, &SearchRequest::exhaustive(&net), "FullReach", None).unwrap();
    let events = controller.subscribe();
    controller.run().unwrap();
    let last = events.iter().find(|event| event.is_terminal()).unwrap();
    controller.stop_algorithm();

    assert_eq!(last, SearchEvent::Finished { steps: 1 });
    assert_eq!(controller.join().unwrap().status, Status::Finished);
    assert!(events.recv_timeout(Duration::from_millis(20)).is_err());
}

#[test]
fn removed_listener_receives_nothing() {
    let mut controller = endless_search();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let id = controller.add_listener(FnListener(move |_: &SearchEvent| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(controller.remove_listener(id));
    assert!(!controller.remove_listener(id));

    let events = controller.subscribe();
    controller.run().unwrap();
    while !matches!(events.recv().unwrap(), SearchEvent::Progress { .. }) {}
    controller.stop_algorithm();
    controller.join().unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn dropping_a_running_controller_cancels_the_worker() {
    let mut controller = endless_search();
    let events = controller.subscribe();
    controller.run().unwrap();
    while !matches!(events.recv().unwrap(), SearchEvent::Progress { .. }) {}
    drop(controller);

    let terminal = events.iter().find(|event| event.is_terminal());
    assert!(matches!(terminal, Some(SearchEvent::Aborted { .. }) | None));
}
