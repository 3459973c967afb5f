use std::{mem::ManuallyDrop, ops, ptr::NonNull};

/// A list node. Every node but the dummy tail carries an element.
pub(crate) struct Node<T> {
    pub(crate) data: Option<T>,
    pub(crate) next: Option<NodePtr<T>>,
}

impl<T> Node<T> {
    pub(crate) fn dummy() -> NodePtr<T> {
        NodePtr::new(Node {
            data: None,
            next: None,
        })
    }

    /// Stores `value` in the dummy at `tail` and makes `dummy` the new tail.
    ///
    /// # Safety
    ///
    /// `tail` must point to the live dummy of its list, and the caller must
    /// hold whatever lock guards that tail.
    pub(crate) unsafe fn fill(tail: &mut NodePtr<T>, value: T, dummy: NodePtr<T>) {
        tail.data = Some(value);
        tail.next = Some(dummy);
        *tail = dummy;
    }
}

/// A list under construction that no other thread can see yet.
///
/// Freed on drop unless handed over with [`Chain::into_ends`].
pub(crate) struct Chain<T> {
    pub(crate) head: NodePtr<T>,
    pub(crate) tail: NodePtr<T>,
}

impl<T> Chain<T> {
    pub(crate) fn new() -> Self {
        let dummy = Node::dummy();
        Self {
            head: dummy,
            tail: dummy,
        }
    }

    pub(crate) fn append(&mut self, value: T) {
        unsafe { Node::fill(&mut self.tail, value, Node::dummy()) };
    }

    /// Gives up ownership of the nodes, returning the head and tail pointers.
    pub(crate) fn into_ends(self) -> (NodePtr<T>, NodePtr<T>) {
        let chain = ManuallyDrop::new(self);
        (chain.head, chain.tail)
    }
}

impl<T> Drop for Chain<T> {
    fn drop(&mut self) {
        unsafe { self.head.free_chain() };
    }
}

/// Raw pointer to a heap allocated `Node`.
///
/// Ownership is tracked by the queue, not the pointer: the node reachable from
/// `head` owns its successor, while `tail` only aliases the last node. Callers
/// must only dereference a node while holding the lock that guards it.
pub(crate) struct NodePtr<T> {
    ptr: NonNull<Node<T>>,
}

impl<T> NodePtr<T> {
    fn new(node: Node<T>) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(Box::new(node))),
        }
    }

    /// Releases the node, returning whatever it still holds.
    ///
    /// # Safety
    ///
    /// The pointer must be the last live reference to the node.
    pub(crate) unsafe fn free(self) -> Node<T> {
        *Box::from_raw(self.ptr.as_ptr())
    }

    /// The next node. Only valid for nodes before the tail.
    pub(crate) fn successor(self) -> NodePtr<T> {
        self.next.expect("node before the tail has a successor")
    }

    /// Frees this node and every node linked after it.
    ///
    /// # Safety
    ///
    /// No other reference into the chain may be used afterwards.
    pub(crate) unsafe fn free_chain(self) {
        let mut cursor = Some(self);
        while let Some(node) = cursor {
            cursor = node.free().next;
        }
    }
}

impl<T> PartialEq for NodePtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for NodePtr<T> {}

impl<T> Clone for NodePtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for NodePtr<T> {}

impl<T> ops::Deref for NodePtr<T> {
    type Target = Node<T>;

    fn deref(&self) -> &Node<T> {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> ops::DerefMut for NodePtr<T> {
    fn deref_mut(&mut self) -> &mut Node<T> {
        unsafe { self.ptr.as_mut() }
    }
}

// The pointer is only dereferenced under the queue's locks.
unsafe impl<T: Send> Send for NodePtr<T> {}
