#![no_main]

use std::time::Duration;

use h1_mux::http::StatusCode;
use h1_mux::server::{Server, ServerEvent};
use h1_mux::{Config, Transport};
use libfuzzer_sys::fuzz_target;

struct Null;

impl Transport for Null {
    fn write(&mut self, _: &[u8]) -> bool {
        true
    }
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn set_timeout(&mut self, _: Option<Duration>) {}
    fn end(&mut self) {}
    fn destroy(&mut self) {}
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut server = Server::new(Null, Config::default().max_head_size(1024));

    let step = (data[0] as usize % 11) + 1;
    let mut pending = vec![];

    for chunk in data[1..].chunks(step) {
        server.on_data(chunk);
        while let Some(ev) = server.poll_event() {
            match ev {
                ServerEvent::Request { id, .. } => pending.push(id),
                ServerEvent::Upgrade { .. } => return,
                _ => {}
            }
        }

        // Answer in reverse, the engine must still keep the wire in order.
        while let Some(id) = pending.pop() {
            let _ = server.write_head(id, StatusCode::OK, None, &[]);
            let _ = server.end(id, Some("ok".into()));
        }
    }
    server.on_end();
    while server.poll_event().is_some() {}
});
