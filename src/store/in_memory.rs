//! InMemoryGraph - HashMap-backed graph store for testing and development.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use serde_json::{Map, Value as JsonValue};

use super::{Assigned, Response, StoreError, Transaction, TxnFactory};
use crate::mutation::{encode, Mutation, Object, Subject};
use crate::node::{DupleNode, Uid};

/// Call counters, for asserting how much store traffic a run caused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub queries: usize,
    pub mutations: usize,
    pub commits: usize,
    pub aborts: usize,
}

#[derive(Default)]
struct StoredNode {
    predicates: HashMap<String, Object>,
    version: u64,
}

/// (predicate, lexical value) pair an equality lookup can observe.
type IndexKey = (String, String);

#[derive(Default)]
struct GraphState {
    nodes: HashMap<String, StoredNode>,
    /// Commit timestamp of the last write touching each index key.
    index: HashMap<IndexKey, u64>,
    clock: u64,
    next_uid: u64,
    forced_aborts: usize,
    failing_queries: usize,
    stats: GraphStats,
}

impl GraphState {
    fn mint_uid(&mut self) -> String {
        self.next_uid += 1;
        format!("{:#x}", self.next_uid)
    }

    fn apply(&mut self, staged: Vec<(String, String, Object)>) {
        self.clock += 1;
        let ts = self.clock;
        let mut touched = Vec::new();

        for (uid, predicate, object) in staged {
            let node = self.nodes.entry(uid).or_default();
            touched.push((predicate.clone(), object.lexical().to_string()));
            if let Some(old) = node.predicates.insert(predicate.clone(), object) {
                touched.push((predicate, old.lexical().to_string()));
            }
            node.version = ts;
        }

        for key in touched {
            self.index.insert(key, ts);
        }
    }
}

/// In-memory graph with snapshot-start optimistic concurrency.
///
/// A commit aborts when any index key or node the transaction read, or any
/// node it writes, was committed by someone else after the transaction
/// started. Clone-friendly via `Arc`.
#[derive(Clone, Default)]
pub struct InMemoryGraph {
    state: Arc<RwLock<GraphState>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `n` commits fail with [`StoreError::Aborted`].
    pub fn abort_next_commits(&self, n: usize) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.forced_aborts = n;
    }

    /// Make the next `n` queries fail with [`StoreError::Query`].
    pub fn fail_next_queries(&self, n: usize) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.failing_queries = n;
    }

    pub fn stats(&self) -> GraphStats {
        self.read().stats.clone()
    }

    pub fn reset_stats(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.stats = GraphStats::default();
    }

    pub fn node_count(&self) -> usize {
        self.read().nodes.len()
    }

    /// Committed predicates of a node.
    pub fn node(&self, uid: &str) -> Option<HashMap<String, Object>> {
        self.read().nodes.get(uid).map(|n| n.predicates.clone())
    }

    /// UIDs of committed nodes whose `predicate` equals `lexical`, sorted.
    pub fn find(&self, predicate: &str, lexical: &str) -> Vec<String> {
        let state = self.read();
        let mut uids: Vec<String> = state
            .nodes
            .iter()
            .filter(|(_, node)| {
                node.predicates
                    .get(predicate)
                    .map_or(false, |o| o.lexical() == lexical)
            })
            .map(|(uid, _)| uid.clone())
            .collect();
        uids.sort();
        uids
    }

    /// Write a node directly, bypassing transactions and stats.
    pub fn seed(&self, node: &DupleNode) -> Result<Uid, StoreError> {
        let mutation = encode(node, &Subject::blank_for(&node.identifier))
            .map_err(|e| StoreError::Mutate(e.to_string()))?;
        if mutation.is_empty() {
            return Err(StoreError::Mutate(format!(
                "node {} has no duples to seed",
                node.identifier
            )));
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::LockPoisoned("seed"))?;
        let uid = state.mint_uid();
        let staged = mutation
            .triples
            .into_iter()
            .map(|t| (uid.clone(), t.predicate, t.object))
            .collect();
        state.apply(staged);

        Ok(Uid::existing(uid))
    }
}

impl TxnFactory for InMemoryGraph {
    type Txn = InMemoryTxn;

    fn new_txn(&self) -> InMemoryTxn {
        InMemoryTxn {
            start_ts: self.read().clock,
            state: Arc::clone(&self.state),
            read_keys: HashSet::new(),
            read_nodes: HashSet::new(),
            staged: Vec::new(),
        }
    }
}

pub struct InMemoryTxn {
    state: Arc<RwLock<GraphState>>,
    start_ts: u64,
    read_keys: HashSet<IndexKey>,
    read_nodes: HashSet<String>,
    staged: Vec<(String, String, Object)>,
}

impl Transaction for InMemoryTxn {
    fn query(&mut self, query: &str) -> Result<Response, StoreError> {
        let (block, tests) = parse_lookup(query)?;

        let matches: Vec<String> = {
            let mut state = self
                .state
                .write()
                .map_err(|_| StoreError::LockPoisoned("query"))?;
            state.stats.queries += 1;
            if state.failing_queries > 0 {
                state.failing_queries -= 1;
                return Err(StoreError::Query("QUERY_ERROR".into()));
            }

            let mut uids: Vec<String> = state
                .nodes
                .iter()
                .filter(|(_, node)| {
                    tests.iter().all(|(predicate, literal)| {
                        node.predicates
                            .get(predicate)
                            .map_or(false, |o| o.lexical() == literal)
                    })
                })
                .map(|(uid, _)| uid.clone())
                .collect();
            uids.sort();
            uids
        };

        self.read_keys.extend(tests);
        self.read_nodes.extend(matches.iter().cloned());

        let records = matches
            .into_iter()
            .map(|uid| {
                let mut record = Map::new();
                record.insert("uid".to_string(), JsonValue::String(uid));
                JsonValue::Object(record)
            })
            .collect();
        let mut body = Map::new();
        body.insert(block, JsonValue::Array(records));

        let json = serde_json::to_vec(&body).map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(Response { json })
    }

    fn mutate(&mut self, mutation: &Mutation) -> Result<Assigned, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::LockPoisoned("mutate"))?;
        state.stats.mutations += 1;

        let mut assigned = Assigned::default();
        for triple in &mutation.triples {
            let uid = match &triple.subject {
                Subject::Existing(uid) => uid.clone(),
                Subject::Blank(label) => match assigned.uids.get(label).cloned() {
                    Some(uid) => uid,
                    None => {
                        let uid = state.mint_uid();
                        assigned.uids.insert(label.clone(), uid.clone());
                        uid
                    }
                },
            };
            self.staged
                .push((uid, triple.predicate.clone(), triple.object.clone()));
        }

        Ok(assigned)
    }

    fn commit(self) -> Result<(), StoreError> {
        let InMemoryTxn {
            state: shared,
            start_ts,
            read_keys,
            read_nodes,
            staged,
        } = self;

        let mut state = shared
            .write()
            .map_err(|_| StoreError::LockPoisoned("commit"))?;

        if state.forced_aborts > 0 {
            state.forced_aborts -= 1;
            state.stats.aborts += 1;
            return Err(StoreError::Aborted);
        }

        let stale_key = read_keys
            .iter()
            .any(|key| state.index.get(key).map_or(false, |ts| *ts > start_ts));
        let stale_node = read_nodes
            .iter()
            .chain(staged.iter().map(|(uid, _, _)| uid))
            .any(|uid| state.nodes.get(uid).map_or(false, |n| n.version > start_ts));

        if stale_key || stale_node {
            state.stats.aborts += 1;
            return Err(StoreError::Aborted);
        }

        if !staged.is_empty() {
            state.apply(staged);
        }
        state.stats.commits += 1;
        Ok(())
    }

    fn discard(self) {}
}

/// Pull the block name and every `eq(<predicate>, "literal")` test out of a
/// lookup query.
fn parse_lookup(query: &str) -> Result<(String, Vec<IndexKey>), StoreError> {
    let malformed = || StoreError::Query(format!("malformed lookup query: {:?}", query));

    let body = query.trim().strip_prefix('{').ok_or_else(malformed)?;
    let open = body.find('(').ok_or_else(malformed)?;
    let block = body[..open].trim().to_string();
    if block.is_empty() {
        return Err(malformed());
    }

    let mut tests = Vec::new();
    let mut rest = &body[open..];
    while let Some(pos) = rest.find("eq(<") {
        rest = &rest[pos + 4..];
        let close = rest.find('>').ok_or_else(malformed)?;
        let predicate = rest[..close].to_string();
        rest = rest[close + 1..].trim_start_matches(|c: char| c == ',' || c.is_whitespace());

        let mut literals = serde_json::Deserializer::from_str(rest).into_iter::<String>();
        let literal = literals
            .next()
            .ok_or_else(malformed)?
            .map_err(|e| StoreError::Query(e.to_string()))?;
        rest = &rest[literals.byte_offset()..];

        tests.push((predicate, literal));
    }

    if tests.is_empty() {
        return Err(malformed());
    }
    Ok((block, tests))
}
