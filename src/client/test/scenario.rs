use std::cell::RefCell;
use std::rc::Rc;

use http::Method;

use crate::client::{Client, ClientEvent, Connector};
use crate::parser::{H1Tokenizer, ParserPool};
use crate::testing::{TestTransport, Wire};
use crate::{Config, Error, MessageId};

/// Hands out a fresh [`Wire`] per connect and remembers all of them.
pub(crate) struct WireConnector {
    wires: Rc<RefCell<Vec<Wire>>>,
    refuse: bool,
}

impl Connector for WireConnector {
    type Transport = TestTransport;

    fn connect(&mut self) -> Result<TestTransport, Error> {
        if self.refuse {
            return Err(Error::Transport(
                std::io::ErrorKind::ConnectionRefused,
                "refused".into(),
            ));
        }
        let wire = Wire::new();
        self.wires.borrow_mut().push(wire.clone());
        Ok(wire.transport())
    }
}

pub(crate) struct Scenario {
    pub(crate) client: Client<WireConnector>,
    wires: Rc<RefCell<Vec<Wire>>>,
}

pub(crate) struct ScenarioBuilder {
    config: Config,
    refuse: bool,
    pool: Option<ParserPool<H1Tokenizer>>,
}

impl Scenario {
    pub(crate) fn builder() -> ScenarioBuilder {
        ScenarioBuilder {
            config: Config::default(),
            refuse: false,
            pool: None,
        }
    }

    /// The `n`th transport handed out.
    pub(crate) fn wire(&self, n: usize) -> Wire {
        self.wires.borrow()[n].clone()
    }

    /// The transport currently in use.
    pub(crate) fn last_wire(&self) -> Wire {
        self.wires.borrow().last().cloned().expect("a wire")
    }

    pub(crate) fn wire_count(&self) -> usize {
        self.wires.borrow().len()
    }

    pub(crate) fn events(&mut self) -> Vec<ClientEvent<TestTransport>> {
        let mut v = vec![];
        while let Some(e) = self.client.poll_event() {
            v.push(e);
        }
        v
    }

    /// A finished request without body.
    pub(crate) fn send(&mut self, method: Method, path: &str) -> MessageId {
        let id = self.client.request(method, path, &[]).unwrap();
        self.client.end(id, None).unwrap();
        id
    }

    pub(crate) fn get(&mut self, path: &str) -> MessageId {
        self.send(Method::GET, path)
    }
}

impl ScenarioBuilder {
    pub(crate) fn config(mut self, f: impl FnOnce(Config) -> Config) -> Self {
        self.config = f(self.config);
        self
    }

    pub(crate) fn refuse_connect(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub(crate) fn pool(mut self, pool: ParserPool<H1Tokenizer>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub(crate) fn build(self) -> Scenario {
        let wires = Rc::new(RefCell::new(vec![]));
        let connector = WireConnector {
            wires: wires.clone(),
            refuse: self.refuse,
        };
        Scenario {
            client: Client::with_pool(connector, self.pool.unwrap_or_default(), self.config),
            wires,
        }
    }
}

/// Short form of an event for assertions.
pub(crate) fn brief(ev: &ClientEvent<TestTransport>) -> String {
    match ev {
        ClientEvent::Connect => "connect".into(),
        ClientEvent::Continue { id } => format!("continue {}", id),
        ClientEvent::Response { id, response } => format!(
            "response {} {}",
            id,
            response.status().map(|s| s.as_u16()).unwrap_or(0)
        ),
        ClientEvent::Data { id, body } => {
            format!("data {} {}", id, String::from_utf8_lossy(body.as_bytes()))
        }
        ClientEvent::End { id, .. } => format!("end {}", id),
        ClientEvent::Drain { id } => format!("drain {}", id),
        ClientEvent::Upgrade { id, .. } => format!("upgrade {}", id),
        ClientEvent::Error { id: Some(id), error } => format!("error {} {}", id, error),
        ClientEvent::Error { id: None, error } => format!("error {}", error),
        ClientEvent::Aborted { id } => format!("aborted {}", id),
        ClientEvent::Close { had_error } => format!("close {}", had_error),
    }
}

pub(crate) fn briefs(events: &[ClientEvent<TestTransport>]) -> Vec<String> {
    events.iter().map(brief).collect()
}
