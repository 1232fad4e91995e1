use http::Method;

use super::scenario::{briefs, Scenario};
use crate::client::ClientEvent;
use crate::{ConnState, Error};

const OK: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";

#[test]
fn get_is_replayed_byte_for_byte() {
    let mut s = Scenario::builder().build();
    let id = s.get("/a");
    s.client.on_connect();
    let first = s.wire(0).written();
    assert!(first.starts_with(b"GET /a HTTP/1.1\r\n"));

    // server hung up before answering
    s.client.on_end();
    assert!(s.wire(0).destroyed());
    assert_eq!(s.wire_count(), 2);
    assert_eq!(s.client.state(), ConnState::Connecting);
    // the replay after reconnecting emits no second drain
    assert_eq!(
        briefs(&s.events()),
        vec!["connect".to_string(), format!("drain {}", id)]
    );

    s.client.on_connect();
    assert_eq!(s.wire(1).written(), first);

    s.client.on_data(OK);
    assert_eq!(
        briefs(&s.events()),
        vec![
            format!("response {} 200", id),
            format!("data {} ok", id),
            format!("end {}", id),
        ]
    );
}

#[test]
fn request_with_body_sent_is_not_replayed() {
    let mut s = Scenario::builder().build();
    let id = s
        .client
        .request(Method::POST, "/a", &[("content-length", "3")])
        .unwrap();
    s.client.end(id, Some("abc".into())).unwrap();
    s.client.on_connect();
    assert!(s.wire(0).written_str().ends_with("abc"));

    s.client.on_end();
    assert_eq!(s.wire_count(), 1);

    let events = s.events();
    assert_eq!(
        briefs(&events),
        vec![
            "connect".to_string(),
            format!("drain {}", id),
            format!("error {} {}", id, Error::PrematureClose),
        ]
    );
    assert_eq!(s.client.in_flight(), 0);
    assert_eq!(s.client.state(), ConnState::Closed);
}

#[test]
fn retries_are_bounded() {
    let mut s = Scenario::builder().config(|c| c.max_retries(1)).build();
    let id = s.get("/a");
    s.client.on_connect();
    s.client.on_end();
    s.client.on_connect();
    s.client.on_end();

    assert_eq!(s.wire_count(), 2);
    let events = s.events();
    assert!(matches!(
        events.last(),
        Some(ClientEvent::Error { id: Some(e), error: Error::PrematureClose }) if *e == id
    ));
}

#[test]
fn started_response_is_not_replayed() {
    let mut s = Scenario::builder().build();
    let id = s.get("/a");
    s.client.on_connect();
    s.client
        .on_data(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nab");
    s.client.on_end();

    assert_eq!(s.wire_count(), 1);
    assert_eq!(
        briefs(&s.events()),
        vec![
            "connect".to_string(),
            format!("drain {}", id),
            format!("response {} 200", id),
            format!("data {} ab", id),
            format!("error {} {}", id, Error::PrematureClose),
        ]
    );
}

#[test]
fn only_the_head_is_replayed() {
    let mut s = Scenario::builder().build();
    let a = s.get("/a");
    let b = s.get("/b");
    s.client.on_connect();
    s.client.on_end();
    s.client.on_connect();

    // b is still behind a
    assert!(s.wire(1).written_str().starts_with("GET /a "));
    assert!(!s.wire(1).written_str().contains("/b"));

    s.client.on_data(OK);
    assert!(s.wire(1).written_str().contains("GET /b "));
    s.client.on_data(OK);

    let ends: Vec<_> = s
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::End { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(ends, vec![a, b]);
}

#[test]
fn idle_end_is_silent() {
    let mut s = Scenario::builder().build();
    s.get("/a");
    s.client.on_connect();
    s.client.on_data(OK);
    s.events();

    s.client.on_end();
    assert!(s.events().is_empty());
    assert_eq!(s.client.state(), ConnState::Closed);

    // next request connects again
    s.get("/b");
    assert_eq!(s.wire_count(), 2);
}

#[test]
fn refused_connect_destroys() {
    let mut s = Scenario::builder().refuse_connect().build();
    let id = s.client.request(Method::GET, "/a", &[]).unwrap();

    let events = s.events();
    assert!(matches!(
        &events[0],
        ClientEvent::Error { id: Some(e), error: Error::Transport(_, _) } if *e == id
    ));
    assert!(matches!(events[1], ClientEvent::Close { had_error: true }));
    assert_eq!(s.client.state(), ConnState::Dead);
    assert_eq!(
        s.client.request(Method::GET, "/b", &[]),
        Err(Error::ConnectionDestroyed)
    );
}
