//! Concurrent skip list
//!
//! A sorted index over opaque byte keys with one writer and any number of
//! lock-free readers.
//!
//! ```text
//! Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
//! Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
//! Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
//! Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
//! ```
//!
//! ## Thread safety
//! - Writes require external serialization: [`SkipList::insert`] takes
//!   `&mut self`, [`SkipList::insert_concurrent`] is `unsafe` and leaves the
//!   serialization to the caller.
//! - Reads take no locks. Nodes live in the list's [`Arena`] and are never
//!   freed before the list itself, and a node is fully initialized before a
//!   release store links it in; readers follow links with acquire loads.
//! - The visible height is published with relaxed ordering. A reader that
//!   sees a stale height searches fewer levels; one that sees a new height
//!   before the new head links finds null there, which sorts after every
//!   key, and drops a level.
//! - There are no back links. `Prev` re-searches from the head.

use std::cell::UnsafeCell;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::keys::KeyComparator;

use super::accelerator::PointLookupAccelerator;
use super::arena::{self, Arena};

/// Maximum tower height
pub const MAX_HEIGHT: usize = 12;

/// Each extra level is kept with probability 1 / BRANCHING
const BRANCHING: u32 = 4;

const HEIGHT_SEED: u64 = 0xdead_beef;

// =============================================================================
// Nodes
// =============================================================================

/// Node header. The tower of `height` links follows it in the same arena
/// allocation, then `key_len` key bytes.
#[repr(C)]
struct Node {
    key_len: usize,
    height: usize,
    tower: [AtomicPtr<Node>; 0],
}

const _: () = assert!(mem::align_of::<Node>() <= arena::ALIGN);

/// Stable handle to an arena-allocated node.
///
/// Only valid while the owning list is alive; every holder keeps the list
/// (or a reference to it) next to the handle.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodePtr(NonNull<Node>);

// SAFETY: nodes are immutable apart from their atomic links
unsafe impl Send for NodePtr {}
unsafe impl Sync for NodePtr {}

impl NodePtr {
    /// # Safety
    /// Caller must hold the arena's allocation exclusivity.
    unsafe fn allocate(arena: &Arena, key: &[u8], height: usize) -> NodePtr {
        debug_assert!((1..=MAX_HEIGHT).contains(&height));
        let tower_bytes = height * mem::size_of::<AtomicPtr<Node>>();
        let size = mem::size_of::<Node>() + tower_bytes + key.len();

        let raw = arena.allocate_aligned(size).as_ptr().cast::<Node>();
        ptr::write(
            raw,
            Node {
                key_len: key.len(),
                height,
                tower: [],
            },
        );

        let tower = ptr::addr_of_mut!((*raw).tower).cast::<AtomicPtr<Node>>();
        for level in 0..height {
            ptr::write(tower.add(level), AtomicPtr::new(ptr::null_mut()));
        }
        ptr::copy_nonoverlapping(key.as_ptr(), tower.add(height).cast::<u8>(), key.len());

        NodePtr(NonNull::new_unchecked(raw))
    }

    fn tower(self) -> *const AtomicPtr<Node> {
        // SAFETY: the pointer came from a live arena allocation
        unsafe { ptr::addr_of!((*self.0.as_ptr()).tower).cast::<AtomicPtr<Node>>() }
    }

    fn height(self) -> usize {
        // SAFETY: header fields are written once before publication
        unsafe { (*self.0.as_ptr()).height }
    }

    fn key(&self) -> &[u8] {
        // SAFETY: key bytes follow the tower and are immutable
        unsafe {
            let len = (*self.0.as_ptr()).key_len;
            slice::from_raw_parts(self.tower().add(self.height()).cast::<u8>(), len)
        }
    }

    fn link(&self, level: usize) -> &AtomicPtr<Node> {
        assert!(level < self.height(), "link level {} above node height", level);
        // SAFETY: level is in bounds of the tower
        unsafe { &*self.tower().add(level) }
    }

    /// Acquire load: the returned node is observed fully initialized
    fn next(self, level: usize) -> Option<NodePtr> {
        NonNull::new(self.link(level).load(Ordering::Acquire)).map(NodePtr)
    }

    /// Release store: anyone who reads `node` through this link sees it initialized
    fn set_next(self, level: usize, node: Option<NodePtr>) {
        self.link(level).store(raw(node), Ordering::Release);
    }

    fn relaxed_next(self, level: usize) -> Option<NodePtr> {
        NonNull::new(self.link(level).load(Ordering::Relaxed)).map(NodePtr)
    }

    fn relaxed_set_next(self, level: usize, node: Option<NodePtr>) {
        self.link(level).store(raw(node), Ordering::Relaxed);
    }
}

fn raw(node: Option<NodePtr>) -> *mut Node {
    node.map_or(ptr::null_mut(), |n| n.0.as_ptr())
}

// =============================================================================
// Skip List
// =============================================================================

/// Ordered index over byte keys; duplicates (under the comparator) are not allowed
pub struct SkipList<C: KeyComparator> {
    comparator: C,
    arena: Arena,
    head: NodePtr,
    /// Height of the tallest tower in use
    max_height: CachePadded<AtomicUsize>,
    len: AtomicUsize,
    /// Writer-only
    rng: UnsafeCell<StdRng>,
    accelerator: Option<PointLookupAccelerator>,
}

// SAFETY: `rng` and the arena's allocation state are only touched by the
// single writer; everything readers touch is atomic or immutable.
unsafe impl<C: KeyComparator> Send for SkipList<C> {}
unsafe impl<C: KeyComparator> Sync for SkipList<C> {}

impl<C: KeyComparator> SkipList<C> {
    /// Create an empty list without the point lookup accelerator
    pub fn new(comparator: C) -> Self {
        Self::with_options(comparator, false)
    }

    /// Create an empty list, optionally maintaining the accelerator
    pub fn with_options(comparator: C, accelerate: bool) -> Self {
        let arena = Arena::new();
        // SAFETY: the arena is not shared yet
        let head = unsafe { NodePtr::allocate(&arena, &[], MAX_HEIGHT) };

        Self {
            comparator,
            arena,
            head,
            max_height: CachePadded::new(AtomicUsize::new(1)),
            len: AtomicUsize::new(0),
            rng: UnsafeCell::new(StdRng::seed_from_u64(HEIGHT_SEED)),
            accelerator: accelerate.then(PointLookupAccelerator::new),
        }
    }

    /// Insert `key`.
    ///
    /// Panics if a key comparing equal is already present.
    pub fn insert(&mut self, key: &[u8]) {
        // SAFETY: `&mut self` rules out any other writer
        unsafe { self.insert_concurrent(key) }
    }

    /// Insert `key` while readers may be traversing the list.
    ///
    /// Panics if a key comparing equal is already present.
    ///
    /// # Safety
    /// Calls to `insert_concurrent` must be serialized by the caller: at
    /// most one may run at any time.
    pub unsafe fn insert_concurrent(&self, key: &[u8]) {
        let mut prev = [self.head; MAX_HEIGHT];
        let existing = self.find_greater_or_equal(key, Some(&mut prev));
        assert!(
            existing.map_or(true, |n| self.comparator.compare(n.key(), key) != CmpOrdering::Equal),
            "duplicate key inserted into skip list"
        );

        let height = self.random_height();
        if height > self.max_height() {
            // prev[] already holds head for the new levels. Readers may see the
            // new height before the links below; null links make them drop a level.
            self.max_height.store(height, Ordering::Relaxed);
        }

        let node = NodePtr::allocate(&self.arena, key, height);
        for (level, before) in prev.iter().enumerate().take(height) {
            // Relaxed is enough here: the release store into `before` publishes `node`
            node.relaxed_set_next(level, before.relaxed_next(level));
            before.set_next(level, Some(node));
        }

        if let Some(accelerator) = &self.accelerator {
            let group = self.comparator.lookup_key(key);
            let starts_group = prev[0] == self.head
                || self.comparator.lookup_key(prev[0].key()) != group;
            if starts_group {
                accelerator.record(group, node);
            }
        }

        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether an entry comparing equal to `key` is present
    pub fn contains(&self, key: &[u8]) -> bool {
        match self.find_greater_or_equal(key, None) {
            Some(node) => self.comparator.compare(node.key(), key) == CmpOrdering::Equal,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes reserved by the arena
    pub fn memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }

    /// Height of the tallest tower inserted so far, at least 1
    pub fn max_height(&self) -> usize {
        self.max_height.load(Ordering::Relaxed)
    }

    pub fn has_accelerator(&self) -> bool {
        self.accelerator.is_some()
    }

    pub fn accelerator(&self) -> Option<&PointLookupAccelerator> {
        self.accelerator.as_ref()
    }

    /// Unpositioned iterator borrowing the list
    pub fn iter(&self) -> Iter<C, &Self> {
        Iter::new(self)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// # Safety
    /// Writer only.
    unsafe fn random_height(&self) -> usize {
        let rng = &mut *self.rng.get();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_ratio(1, BRANCHING) {
            height += 1;
        }
        height
    }

    /// First node at or after `key`. Fills `prev[level]` with the last node
    /// before `key` on every level below the current height.
    fn find_greater_or_equal(
        &self,
        key: &[u8],
        mut prev: Option<&mut [NodePtr; MAX_HEIGHT]>,
    ) -> Option<NodePtr> {
        let mut x = self.head;
        let mut level = self.max_height() - 1;
        loop {
            let next = x.next(level);
            match next {
                Some(n) if self.comparator.compare(n.key(), key) == CmpOrdering::Less => x = n,
                _ => {
                    if let Some(prev) = prev.as_deref_mut() {
                        prev[level] = x;
                    }
                    if level == 0 {
                        return next;
                    }
                    level -= 1;
                }
            }
        }
    }

    /// Last node strictly before `key`, or head
    fn find_less_than(&self, key: &[u8]) -> NodePtr {
        let mut x = self.head;
        let mut level = self.max_height() - 1;
        loop {
            debug_assert!(
                x == self.head || self.comparator.compare(x.key(), key) == CmpOrdering::Less
            );
            match x.next(level) {
                Some(n) if self.comparator.compare(n.key(), key) == CmpOrdering::Less => x = n,
                _ => {
                    if level == 0 {
                        return x;
                    }
                    level -= 1;
                }
            }
        }
    }

    /// Last node in the list, or head when empty
    fn find_last(&self) -> NodePtr {
        let mut x = self.head;
        let mut level = self.max_height() - 1;
        loop {
            match x.next(level) {
                Some(n) => x = n,
                None => {
                    if level == 0 {
                        return x;
                    }
                    level -= 1;
                }
            }
        }
    }

    /// First node at or after `target`, entering through the accelerator
    /// when it knows `target`'s group.
    ///
    /// The accelerator points at the first node of a group, and groups are
    /// contiguous, so every node before the candidate sorts before `target`.
    /// Walking level 0 forward from there reaches the answer.
    fn seek_node(&self, target: &[u8]) -> Option<NodePtr> {
        if let Some(accelerator) = &self.accelerator {
            if let Some(mut node) = accelerator.candidate(self.comparator.lookup_key(target)) {
                while self.comparator.compare(node.key(), target) == CmpOrdering::Less {
                    node = node.next(0)?;
                }
                return Some(node);
            }
        }
        self.find_greater_or_equal(target, None)
    }

    fn non_head(&self, node: NodePtr) -> Option<NodePtr> {
        (node != self.head).then_some(node)
    }
}

impl<C: KeyComparator> fmt::Debug for SkipList<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipList")
            .field("len", &self.len())
            .field("max_height", &self.max_height())
            .field("memory_usage", &self.memory_usage())
            .field("accelerated", &self.has_accelerator())
            .finish()
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// Cursor over a skip list.
///
/// Generic over how the list is held (`&SkipList` or `Arc<SkipList>`), so
/// owners can hand out iterators that keep the arena alive.
pub struct Iter<C, L>
where
    C: KeyComparator,
    L: Deref<Target = SkipList<C>>,
{
    list: L,
    node: Option<NodePtr>,
    _comparator: PhantomData<fn() -> C>,
}

impl<C, L> Iter<C, L>
where
    C: KeyComparator,
    L: Deref<Target = SkipList<C>>,
{
    /// The returned iterator is not valid until positioned
    pub fn new(list: L) -> Self {
        Self {
            list,
            node: None,
            _comparator: PhantomData,
        }
    }

    pub fn valid(&self) -> bool {
        self.node.is_some()
    }

    fn current(&self) -> NodePtr {
        match self.node {
            Some(node) => node,
            None => panic!("skip list iterator used while not valid"),
        }
    }

    /// Key at the current position. Requires `valid()`.
    pub fn key(&self) -> &[u8] {
        match &self.node {
            Some(node) => node.key(),
            None => panic!("skip list iterator used while not valid"),
        }
    }

    /// Requires `valid()`
    pub fn next(&mut self) {
        self.node = self.current().next(0);
    }

    /// Requires `valid()`. Costs a search from the head.
    pub fn prev(&mut self) {
        let current = self.current();
        let before = self.list.find_less_than(current.key());
        self.node = self.list.non_head(before);
    }

    /// Position at the first key at or after `target`
    pub fn seek(&mut self, target: &[u8]) {
        self.node = self.list.seek_node(target);
    }

    pub fn seek_to_first(&mut self) {
        self.node = self.list.head.next(0);
    }

    pub fn seek_to_last(&mut self) {
        let last = self.list.find_last();
        self.node = self.list.non_head(last);
    }
}

impl<C, L> Clone for Iter<C, L>
where
    C: KeyComparator,
    L: Deref<Target = SkipList<C>> + Clone,
{
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            node: self.node,
            _comparator: PhantomData,
        }
    }
}
