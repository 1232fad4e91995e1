#![no_main]

use std::time::Duration;

use h1_mux::client::{Client, ClientEvent};
use h1_mux::http::Method;
use h1_mux::{Config, Error, Transport};
use libfuzzer_sys::fuzz_target;

const METHODS: &[Method] = &[Method::GET, Method::HEAD, Method::POST, Method::PUT];

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
    if data.len() < 4 {
        return;
    }

    let connector = || -> Result<Null, Error> { Ok(Null) };
    let mut client = Client::new(connector, Config::default().max_retries(1));

    // The first bytes pick the pipelined requests, the rest is the server talking.
    let count = (data[0] % 4) as usize + 1;
    for i in 0..count {
        let method = METHODS[data[1 + i % 3] as usize % METHODS.len()].clone();
        let Ok(id) = client.request(method, "/fuzz", &[("content-length", "2")]) else {
            return;
        };
        let _ = client.end(id, Some("ab".into()));
    }
    client.on_connect();

    // Feed in uneven slices to cross every callback boundary.
    let input = &data[4..];
    let step = (data[3] as usize % 7) + 1;
    for chunk in input.chunks(step) {
        client.on_data(chunk);
        while let Some(ev) = client.poll_event() {
            if let ClientEvent::Upgrade { .. } = ev {
                return;
            }
        }
    }
    client.on_end();
    while client.poll_event().is_some() {}
});
