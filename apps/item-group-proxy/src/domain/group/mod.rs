//! Item Group Index
//!
//! Domain types for tracking forwarded item streams by the item group the
//! backend assigns them to, so a single group or service status can be
//! fanned out to every affected client stream.
//!
//! # Design
//!
//! The index keeps two views of the same subscriptions:
//! - A handle index: backend handle → subscription (owns the data)
//! - Per-service membership: group id → member handles, plus every handle
//!   routed to the service whether or not it has been grouped yet
//!
//! Subscriptions refer to their group by id rather than by pointer, so
//! moving a stream between groups or merging whole groups only touches
//! the membership sets.
//!
//! Every lookup miss is a silent no-op. Backend messages can arrive out of
//! order relative to local bookkeeping (a close racing a group status, a
//! group assignment for a stream that was already torn down), so every
//! operation is idempotent.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::status::StreamStatus;

// =============================================================================
// Types
// =============================================================================

/// Name of a backend service (data source).
pub type ServiceName = String;

/// Opaque backend handle identifying one forwarded item stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamHandle(pub u64);

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Opaque client-facing request token, handed back with every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientToken(pub u64);

impl fmt::Display for ClientToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Server-assigned item group identifier (opaque bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Vec<u8>);

impl GroupId {
    /// Create a group id from raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw group id bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for GroupId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for GroupId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Message-model type of a requested item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ModelType {
    /// Login stream.
    Login,
    /// Source directory.
    Directory,
    /// Data dictionary.
    Dictionary,
    /// Level 1 price data.
    #[default]
    MarketPrice,
    /// Order-level depth.
    MarketByOrder,
    /// Price-level depth.
    MarketByPrice,
    /// Market maker quotes.
    MarketMaker,
    /// Symbol list.
    SymbolList,
    /// Any other (custom) model.
    Other(u8),
}

impl ModelType {
    /// Numeric model code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Login => 1,
            Self::Directory => 4,
            Self::Dictionary => 5,
            Self::MarketPrice => 6,
            Self::MarketByOrder => 7,
            Self::MarketByPrice => 8,
            Self::MarketMaker => 9,
            Self::SymbolList => 10,
            Self::Other(code) => code,
        }
    }

    /// Model name for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Directory => "directory",
            Self::Dictionary => "dictionary",
            Self::MarketPrice => "market_price",
            Self::MarketByOrder => "market_by_order",
            Self::MarketByPrice => "market_by_price",
            Self::MarketMaker => "market_maker",
            Self::SymbolList => "symbol_list",
            Self::Other(_) => "other",
        }
    }
}

impl From<u8> for ModelType {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Login,
            4 => Self::Directory,
            5 => Self::Dictionary,
            6 => Self::MarketPrice,
            7 => Self::MarketByOrder,
            8 => Self::MarketByPrice,
            9 => Self::MarketMaker,
            10 => Self::SymbolList,
            other => Self::Other(other),
        }
    }
}

impl From<ModelType> for u8 {
    fn from(model: ModelType) -> Self {
        model.code()
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// One item request forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Backend handle.
    pub handle: StreamHandle,
    /// Client-facing token.
    pub token: ClientToken,
    /// Service the request was routed to.
    pub service: ServiceName,
    /// Requested item name.
    pub item_name: String,
    /// Message-model type.
    pub model_type: ModelType,
    /// Current item group, `None` until the backend assigns one.
    pub group: Option<GroupId>,
}

// =============================================================================
// Service Entry
// =============================================================================

/// Membership state for a single service.
#[derive(Debug, Default)]
struct ServiceEntry {
    /// Group id → member handles.
    groups: HashMap<GroupId, HashSet<StreamHandle>>,
    /// Every handle routed to this service, grouped or not.
    members: HashSet<StreamHandle>,
}

impl ServiceEntry {
    fn unassigned(&self, subscriptions: &HashMap<StreamHandle, Subscription>) -> Vec<StreamHandle> {
        let mut handles: Vec<_> = self
            .members
            .iter()
            .filter(|h| subscriptions.get(*h).is_some_and(|s| s.group.is_none()))
            .copied()
            .collect();
        handles.sort_unstable();
        handles
    }
}

// =============================================================================
// Group Index
// =============================================================================

/// Indexes forwarded item streams by service and item group.
///
/// The index is owned by a single event-loop task and mutated through
/// `&mut self`; it holds no locks.
///
/// # Example
///
/// ```rust
/// use item_group_proxy::domain::group::{
///     ClientToken, GroupId, GroupIndex, ModelType, StreamHandle,
/// };
/// use item_group_proxy::domain::status::Status;
///
/// let mut index = GroupIndex::new();
/// let g1 = GroupId::new(vec![0, 1]);
///
/// index.add_subscription("svcA", StreamHandle(1), ClientToken(10), "IBM.N", ModelType::MarketPrice);
/// index.add_subscription("svcA", StreamHandle(2), ClientToken(20), "MSFT.O", ModelType::MarketPrice);
/// index.assign_group(StreamHandle(1), &g1);
/// index.assign_group(StreamHandle(2), &g1);
///
/// // A terminal group status reaches both streams and tears them down
/// let mut tokens = Vec::new();
/// let visited = index.apply_status_to_group("svcA", &g1, &Status::closed("source down"), |sub, _| {
///     tokens.push(sub.token);
/// });
///
/// assert_eq!(visited, 2);
/// assert_eq!(tokens, vec![ClientToken(10), ClientToken(20)]);
/// assert!(index.is_empty());
/// assert!(!index.contains_group("svcA", &g1));
/// ```
#[derive(Debug, Default)]
pub struct GroupIndex {
    services: HashMap<ServiceName, ServiceEntry>,
    subscriptions: HashMap<StreamHandle, Subscription>,
    /// Streams with no group yet.
    unassigned: usize,
}

impl GroupIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a forwarded item stream, not yet assigned to any group.
    ///
    /// Requests without a service name (still pending routing) are not
    /// indexed. Re-registering a known handle is ignored.
    ///
    /// Returns `true` if the subscription was added.
    pub fn add_subscription(
        &mut self,
        service: &str,
        handle: StreamHandle,
        token: ClientToken,
        item_name: impl Into<String>,
        model_type: ModelType,
    ) -> bool {
        if service.is_empty() || self.subscriptions.contains_key(&handle) {
            return false;
        }

        self.services
            .entry(service.to_string())
            .or_default()
            .members
            .insert(handle);

        self.subscriptions.insert(
            handle,
            Subscription {
                handle,
                token,
                service: service.to_string(),
                item_name: item_name.into(),
                model_type,
                group: None,
            },
        );
        self.unassigned += 1;

        true
    }

    /// Move a stream into `group`, creating the group if needed.
    ///
    /// Returns `true` if the stream's group changed.
    pub fn assign_group(&mut self, handle: StreamHandle, group: &GroupId) -> bool {
        let Some(sub) = self.subscriptions.get_mut(&handle) else {
            return false;
        };

        if sub.group.as_ref() == Some(group) {
            return false;
        }

        let Some(entry) = self.services.get_mut(&sub.service) else {
            return false;
        };

        match sub.group.take() {
            Some(previous) => {
                if let Some(members) = entry.groups.get_mut(&previous) {
                    members.remove(&handle);
                }
            }
            None => self.unassigned -= 1,
        }

        entry.groups.entry(group.clone()).or_default().insert(handle);
        sub.group = Some(group.clone());

        true
    }

    /// Move every member of `from` into `to` within `service`.
    ///
    /// `from` is left in place with no members so late messages that still
    /// reference it resolve to an empty group; see [`Self::purge_empty_groups`].
    ///
    /// Returns the number of streams moved.
    pub fn merge_group(&mut self, service: &str, from: &GroupId, to: &GroupId) -> usize {
        if from == to {
            return 0;
        }

        let Some(entry) = self.services.get_mut(service) else {
            return 0;
        };

        let moved = match entry.groups.get_mut(from) {
            Some(members) if !members.is_empty() => std::mem::take(members),
            _ => return 0,
        };

        for handle in &moved {
            if let Some(sub) = self.subscriptions.get_mut(handle) {
                sub.group = Some(to.clone());
            }
        }

        let count = moved.len();
        entry.groups.entry(to.clone()).or_default().extend(moved);

        count
    }

    /// Deliver `status` to every member of `group` under `service`.
    ///
    /// `visit` runs once per member, in handle order. When the status is
    /// terminal each member is removed from the index before it is
    /// visited, and the group itself is removed afterwards.
    ///
    /// Returns the number of streams visited.
    pub fn apply_status_to_group<S, F>(
        &mut self,
        service: &str,
        group: &GroupId,
        status: &S,
        mut visit: F,
    ) -> usize
    where
        S: StreamStatus + ?Sized,
        F: FnMut(&Subscription, &S),
    {
        let Some(handles) = self
            .services
            .get(service)
            .and_then(|entry| entry.groups.get(group))
            .map(sorted_handles)
        else {
            return 0;
        };

        let visited = self.visit_handles(&handles, status, &mut visit);

        if status.is_terminal()
            && let Some(entry) = self.services.get_mut(service)
        {
            entry.groups.remove(group);
        }

        visited
    }

    /// Deliver `status` to every stream routed to `service`.
    ///
    /// Groups are visited in id order, followed by streams that have not
    /// been assigned a group yet. A terminal status removes the whole
    /// service afterwards.
    ///
    /// Returns the number of streams visited.
    pub fn apply_status_to_service<S, F>(&mut self, service: &str, status: &S, mut visit: F) -> usize
    where
        S: StreamStatus + ?Sized,
        F: FnMut(&Subscription, &S),
    {
        let Some(entry) = self.services.get(service) else {
            return 0;
        };

        let mut group_ids: Vec<GroupId> = entry.groups.keys().cloned().collect();
        group_ids.sort_unstable();
        let unassigned = entry.unassigned(&self.subscriptions);

        let mut visited = 0;
        for group in &group_ids {
            visited += self.apply_status_to_group(service, group, status, &mut visit);
        }
        visited += self.visit_handles(&unassigned, status, &mut visit);

        if status.is_terminal() {
            self.services.remove(service);
        }

        visited
    }

    /// Remove a single stream. Unknown handles are ignored.
    ///
    /// Returns the removed subscription, if it was indexed.
    pub fn remove_subscription(&mut self, handle: StreamHandle) -> Option<Subscription> {
        let sub = self.subscriptions.remove(&handle)?;
        if sub.group.is_none() {
            self.unassigned -= 1;
        }

        if let Some(entry) = self.services.get_mut(&sub.service) {
            entry.members.remove(&handle);
            if let Some(group) = &sub.group
                && let Some(members) = entry.groups.get_mut(group)
            {
                members.remove(&handle);
            }
        }

        Some(sub)
    }

    /// Remove a service with all of its groups and streams.
    ///
    /// Returns the number of streams removed.
    pub fn remove_service(&mut self, service: &str) -> usize {
        let Some(entry) = self.services.remove(service) else {
            return 0;
        };

        let mut removed = 0;
        for handle in &entry.members {
            if let Some(sub) = self.subscriptions.remove(handle) {
                if sub.group.is_none() {
                    self.unassigned -= 1;
                }
                removed += 1;
            }
        }

        removed
    }

    /// Drop groups under `service` that have no members left.
    ///
    /// Returns the number of groups dropped.
    pub fn purge_empty_groups(&mut self, service: &str) -> usize {
        let Some(entry) = self.services.get_mut(service) else {
            return 0;
        };

        let before = entry.groups.len();
        entry.groups.retain(|_, members| !members.is_empty());
        before - entry.groups.len()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Look up a stream by backend handle.
    #[must_use]
    pub fn subscription(&self, handle: StreamHandle) -> Option<&Subscription> {
        self.subscriptions.get(&handle)
    }

    /// Current group of a stream.
    #[must_use]
    pub fn group_of(&self, handle: StreamHandle) -> Option<&GroupId> {
        self.subscriptions.get(&handle)?.group.as_ref()
    }

    /// Member handles of a group, in handle order.
    #[must_use]
    pub fn group_members(&self, service: &str, group: &GroupId) -> Vec<StreamHandle> {
        self.services
            .get(service)
            .and_then(|entry| entry.groups.get(group))
            .map(sorted_handles)
            .unwrap_or_default()
    }

    /// Whether `group` currently exists under `service` (possibly empty).
    #[must_use]
    pub fn contains_group(&self, service: &str, group: &GroupId) -> bool {
        self.services
            .get(service)
            .is_some_and(|entry| entry.groups.contains_key(group))
    }

    /// Whether `service` has an entry.
    #[must_use]
    pub fn contains_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Names of all indexed services, sorted.
    #[must_use]
    pub fn service_names(&self) -> Vec<ServiceName> {
        let mut names: Vec<_> = self.services.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of indexed streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no streams are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Snapshot of index sizes.
    #[must_use]
    pub fn stats(&self) -> GroupIndexStats {
        GroupIndexStats {
            service_count: self.services.len(),
            group_count: self.services.values().map(|e| e.groups.len()).sum(),
            subscription_count: self.subscriptions.len(),
            unassigned_count: self.unassigned,
        }
    }

    /// Visit a snapshot of handles, detaching each first if `status` is terminal.
    fn visit_handles<S, F>(&mut self, handles: &[StreamHandle], status: &S, visit: &mut F) -> usize
    where
        S: StreamStatus + ?Sized,
        F: FnMut(&Subscription, &S),
    {
        let terminal = status.is_terminal();
        let mut visited = 0;

        for handle in handles {
            if terminal {
                if let Some(sub) = self.remove_subscription(*handle) {
                    visit(&sub, status);
                    visited += 1;
                }
            } else if let Some(sub) = self.subscriptions.get(handle) {
                visit(sub, status);
                visited += 1;
            }
        }

        visited
    }
}

fn sorted_handles(members: &HashSet<StreamHandle>) -> Vec<StreamHandle> {
    let mut handles: Vec<_> = members.iter().copied().collect();
    handles.sort_unstable();
    handles
}

// =============================================================================
// Statistics
// =============================================================================

/// Index size snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupIndexStats {
    /// Number of services with an entry.
    pub service_count: usize,
    /// Number of groups across all services (including empty ones).
    pub group_count: usize,
    /// Number of indexed streams.
    pub subscription_count: usize,
    /// Streams not yet assigned to a group.
    pub unassigned_count: usize,
}

// =============================================================================
// Tests
// =============================================================================
