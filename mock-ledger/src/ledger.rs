use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use marbles_client::{wire::WireEvent, CallKind, LedgerResponse, Request};
use marbles_core::{ClearMarblesResponse, Marble, Owner};
use metrics::counter;
use rand_distr::{Distribution, SkewNormal};
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, trace};

pub mod status {
    pub const OK: i32 = 200;
    pub const BAD_REQUEST: i32 = 400;
    pub const FORBIDDEN: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const METHOD_NOT_ALLOWED: i32 = 405;
    pub const CONFLICT: i32 = 409;
    pub const BUSY: i32 = 500;
}

const MUTATING: [&str; 6] = [
    "init_owner",
    "init_marble",
    "set_owner",
    "delete_marble",
    "write",
    "clear_marbles",
];

const EVENT_BUFFER: usize = 1024;

/// One `set_owner` call as seen by the ledger, whatever its outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferAttempt {
    pub marble_id: String,
    pub to_owner_id: String,
    pub auth_company: String,
    pub status: i32,
}

#[derive(Clone, Debug)]
enum FaultMode {
    Always,
    /// 1-based call numbers that fail.
    Calls(BTreeSet<usize>),
    /// Calls past the first `n` fail.
    After(usize),
}

#[derive(Clone, Debug)]
struct Fault {
    mode: FaultMode,
    status: i32,
}

impl Fault {
    fn hits(&self, call: usize) -> bool {
        match &self.mode {
            FaultMode::Always => true,
            FaultMode::Calls(calls) => calls.contains(&call),
            FaultMode::After(n) => call > *n,
        }
    }
}

#[derive(Default)]
struct WorldState {
    owners: HashMap<String, Owner>,
    marbles: HashMap<String, Marble>,
    values: HashMap<String, Vec<u8>>,
}

struct Outcome {
    status: i32,
    payload: Vec<u8>,
    message: String,
}

impl Outcome {
    fn ok(payload: Vec<u8>) -> Self {
        Self {
            status: status::OK,
            payload,
            message: String::new(),
        }
    }

    fn err(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            payload: vec![],
            message: message.into(),
        }
    }
}

/// In-memory marbles ledger.
///
/// Implements the marbles procedures on a single world state shared by every
/// channel, with knobs to inject failures, cap throughput and add latency.
pub struct MockLedger {
    world: RwLock<WorldState>,
    faults: Mutex<HashMap<String, Fault>>,
    calls: Mutex<HashMap<String, usize>>,
    transfers: Mutex<Vec<TransferAttempt>>,
    events: broadcast::Sender<WireEvent>,
    limiter: Option<DefaultDirectRateLimiter>,
    latency: Option<SkewNormal<f64>>,
    tx_seq: AtomicU64,
}

impl MockLedger {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            world: RwLock::new(WorldState::default()),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            transfers: Mutex::new(vec![]),
            events,
            limiter: None,
            latency: None,
            tx_seq: AtomicU64::new(0),
        }
    }

    /// Answers 500 "ledger busy" to calls over `tps`.
    pub fn with_tps_limit(mut self, tps: NonZeroU32) -> Self {
        self.limiter = Some(RateLimiter::direct(Quota::per_second(tps)));
        self
    }

    /// Delays every call by a sample of `latency_ms`, in milliseconds.
    pub fn with_latency(mut self, latency_ms: SkewNormal<f64>) -> Self {
        self.latency = Some(latency_ms);
        self
    }

    /** Fault injection **/

    pub fn fail_always(&self, function: &str, status: i32) {
        self.set_fault(function, FaultMode::Always, status);
    }

    /// Fails the given 1-based calls of `function`.
    pub fn fail_calls(&self, function: &str, calls: impl IntoIterator<Item = usize>, status: i32) {
        self.set_fault(function, FaultMode::Calls(calls.into_iter().collect()), status);
    }

    /// Lets the first `allowed` calls of `function` through and fails the rest.
    pub fn fail_after(&self, function: &str, allowed: usize, status: i32) {
        self.set_fault(function, FaultMode::After(allowed), status);
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    fn set_fault(&self, function: &str, mode: FaultMode, status: i32) {
        lock(&self.faults).insert(function.to_string(), Fault { mode, status });
    }

    /** Inspection **/

    /// Calls received for `function`, failed ones included.
    pub fn calls(&self, function: &str) -> usize {
        lock(&self.calls).get(function).copied().unwrap_or(0)
    }

    pub fn transfer_attempts(&self) -> Vec<TransferAttempt> {
        lock(&self.transfers).clone()
    }

    pub fn owner(&self, id: &str) -> Option<Owner> {
        self.read_world().owners.get(id).cloned()
    }

    pub fn marble(&self, id: &str) -> Option<Marble> {
        self.read_world().marbles.get(id).cloned()
    }

    pub fn marble_count(&self) -> usize {
        self.read_world().marbles.len()
    }

    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.read_world().values.get(key).cloned()
    }

    /// Events of every committed invoke; the event id is the function name.
    pub fn subscribe(&self) -> broadcast::Receiver<WireEvent> {
        self.events.subscribe()
    }

    /** Procedures **/

    pub async fn handle(&self, kind: CallKind, request: &Request) -> LedgerResponse {
        let function = request.function.as_str();
        let call = {
            let mut calls = lock(&self.calls);
            let count = calls.entry(function.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        counter!("mock_ledger_calls", "function" => function.to_string()).increment(1);

        if let Some(latency) = &self.latency {
            let ms = latency.sample(&mut rand::thread_rng()).max(0.);
            tokio::time::sleep(Duration::from_secs_f64(ms / 1000.)).await;
        }

        let tx_id = format!("tx{:016x}", self.tx_seq.fetch_add(1, Ordering::Relaxed) + 1);
        let outcome = self.outcome(kind, request, call);
        trace!("{kind:?} {function} #{call} -> {}", outcome.status);

        if function == "set_owner" {
            let arg = |i: usize| {
                request
                    .args
                    .get(i)
                    .map(|a| String::from_utf8_lossy(a).into_owned())
                    .unwrap_or_default()
            };
            lock(&self.transfers).push(TransferAttempt {
                marble_id: arg(0),
                to_owner_id: arg(1),
                auth_company: arg(2),
                status: outcome.status,
            });
        }

        if outcome.status == status::OK && kind == CallKind::Invoke {
            let payload = request.args.first().cloned().unwrap_or_default();
            let event = WireEvent::new(&tx_id, &request.procedure_id, function, &payload);
            // No subscribers is fine.
            let _ = self.events.send(event);
        }

        LedgerResponse {
            status: outcome.status,
            payload: outcome.payload,
            message: outcome.message,
            tx_id,
        }
    }

    fn outcome(&self, kind: CallKind, request: &Request, call: usize) -> Outcome {
        let function = request.function.as_str();

        let fault = lock(&self.faults).get(function).cloned();
        if let Some(fault) = fault.filter(|f| f.hits(call)) {
            debug!("Injecting {} into {function} call #{call}", fault.status);
            return Outcome::err(fault.status, format!("injected failure of {function}"));
        }

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                return Outcome::err(status::BUSY, "ledger busy");
            }
        }

        if kind == CallKind::Query && MUTATING.contains(&function) {
            return Outcome::err(
                status::METHOD_NOT_ALLOWED,
                format!("{function} cannot be queried"),
            );
        }

        let args: Vec<String> = match request
            .args
            .iter()
            .map(|a| String::from_utf8(a.clone()))
            .collect()
        {
            Ok(args) => args,
            Err(_) => return Outcome::err(status::BAD_REQUEST, "arguments must be UTF-8"),
        };

        match function {
            "init_owner" => self.init_owner(&args),
            "init_marble" => self.init_marble(&args),
            "set_owner" => self.set_owner(&args),
            "delete_marble" => self.delete_marble(&args),
            "read" => self.read(&args),
            "write" => self.write(&args),
            "clear_marbles" => self.clear_marbles(),
            other => Outcome::err(status::BAD_REQUEST, format!("unknown function {other}")),
        }
    }

    fn init_owner(&self, args: &[String]) -> Outcome {
        let [id, username, company] = args else {
            return arity("init_owner", 3, args);
        };

        let mut world = self.write_world();
        if world.owners.contains_key(id) {
            return Outcome::err(status::CONFLICT, format!("owner {id} already exists"));
        }
        world
            .owners
            .insert(id.clone(), Owner::new(id, username, company));
        Outcome::ok(vec![])
    }

    fn init_marble(&self, args: &[String]) -> Outcome {
        let (id, color, size, owner_id, auth_company, extra) = match args {
            [id, color, size, owner_id, auth_company] => {
                (id, color, size, owner_id, auth_company, None)
            }
            [id, color, size, owner_id, auth_company, extra] => {
                (id, color, size, owner_id, auth_company, Some(extra.clone()))
            }
            _ => return arity("init_marble", 5, args),
        };
        let Ok(size) = size.parse::<u32>() else {
            return Outcome::err(status::BAD_REQUEST, format!("size {size} is not a number"));
        };

        let mut world = self.write_world();
        let Some(owner) = world.owners.get(owner_id).cloned() else {
            return Outcome::err(status::NOT_FOUND, format!("owner {owner_id} not found"));
        };
        if owner.company != *auth_company {
            return Outcome::err(
                status::FORBIDDEN,
                format!("{auth_company} cannot act for {}", owner.id),
            );
        }
        if world.marbles.contains_key(id) {
            return Outcome::err(status::CONFLICT, format!("marble {id} already exists"));
        }

        world.marbles.insert(
            id.clone(),
            Marble {
                id: id.clone(),
                color: color.clone(),
                size,
                owner,
                additional_data: extra,
            },
        );
        Outcome::ok(vec![])
    }

    fn set_owner(&self, args: &[String]) -> Outcome {
        let [marble_id, to_owner_id, auth_company] = args else {
            return arity("set_owner", 3, args);
        };

        let mut world = self.write_world();
        let Some(to_owner) = world.owners.get(to_owner_id).cloned() else {
            return Outcome::err(status::NOT_FOUND, format!("owner {to_owner_id} not found"));
        };
        let Some(marble) = world.marbles.get_mut(marble_id) else {
            return Outcome::err(status::NOT_FOUND, format!("marble {marble_id} not found"));
        };
        if marble.owner.company != *auth_company {
            return Outcome::err(
                status::FORBIDDEN,
                format!("{auth_company} cannot transfer {marble_id}"),
            );
        }

        marble.owner = to_owner;
        Outcome::ok(vec![])
    }

    fn delete_marble(&self, args: &[String]) -> Outcome {
        let [marble_id, auth_company] = args else {
            return arity("delete_marble", 2, args);
        };

        let mut world = self.write_world();
        let Some(marble) = world.marbles.get(marble_id) else {
            return Outcome::err(status::NOT_FOUND, format!("marble {marble_id} not found"));
        };
        if marble.owner.company != *auth_company {
            return Outcome::err(
                status::FORBIDDEN,
                format!("{auth_company} cannot delete {marble_id}"),
            );
        }
        world.marbles.remove(marble_id);
        Outcome::ok(vec![])
    }

    fn read(&self, args: &[String]) -> Outcome {
        let [key] = args else {
            return arity("read", 1, args);
        };

        let world = self.read_world();
        let payload = if let Some(owner) = world.owners.get(key) {
            serde_json::to_vec(owner)
        } else if let Some(marble) = world.marbles.get(key) {
            serde_json::to_vec(marble)
        } else {
            Ok(world.values.get(key).cloned().unwrap_or_default())
        };

        match payload {
            Ok(payload) => Outcome::ok(payload),
            Err(err) => Outcome::err(status::BUSY, err.to_string()),
        }
    }

    fn write(&self, args: &[String]) -> Outcome {
        let [key, value] = args else {
            return arity("write", 2, args);
        };
        self.write_world()
            .values
            .insert(key.clone(), value.as_bytes().to_vec());
        Outcome::ok(vec![])
    }

    fn clear_marbles(&self) -> Outcome {
        let mut world = self.write_world();
        let found = world.marbles.len();
        world.marbles.clear();

        let response = ClearMarblesResponse {
            found,
            deleted: found,
            ..Default::default()
        };
        match serde_json::to_vec(&response) {
            Ok(payload) => Outcome::ok(payload),
            Err(err) => Outcome::err(status::BUSY, err.to_string()),
        }
    }

    fn read_world(&self) -> std::sync::RwLockReadGuard<'_, WorldState> {
        self.world.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_world(&self) -> std::sync::RwLockWriteGuard<'_, WorldState> {
        self.world.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn arity(function: &str, expected: usize, args: &[String]) -> Outcome {
    Outcome::err(
        status::BAD_REQUEST,
        format!("{function} expects {expected} arguments, got {}", args.len()),
    )
}
