use crate::core::Transaction;

/// Pending transactions in insertion order.
///
/// Insertion order matters: the next proof search hashes the pool exactly as
/// it is laid out here. The pool has no lock of its own; the ledger owns it
/// behind its state lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    inner: Vec<Transaction>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool { inner: vec![] }
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> MemoryPool {
        MemoryPool {
            inner: transactions,
        }
    }

    pub fn add(&mut self, tx: Transaction) {
        self.inner.push(tx);
    }

    /// Removes every entry equal to `tx` field by field. Returns whether
    /// anything was removed; an absent entry is not an error.
    pub fn remove_matching(&mut self, tx: &Transaction) -> bool {
        let before = self.inner.len();
        self.inner.retain(|pending| pending != tx);
        self.inner.len() != before
    }

    /// Sum of every pending amount sent by `participant`.
    pub fn pending_debits(&self, participant: &str) -> f64 {
        self.inner
            .iter()
            .filter(|tx| tx.get_sender() == participant)
            .map(|tx| tx.get_amount())
            .sum()
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.inner.clone()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(sender: &str, amount: f64) -> Transaction {
        Transaction::new(sender, "bob", "ab", amount).unwrap()
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut pool = MemoryPool::new();
        pool.add(tx("carol", 1.0));
        pool.add(tx("alice", 2.0));
        pool.add(tx("bob", 3.0));

        let senders: Vec<_> = pool.get_all().iter().map(|t| t.get_sender().to_string()).collect();
        assert_eq!(senders, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_remove_matching_requires_every_field() {
        let mut pool = MemoryPool::new();
        pool.add(tx("alice", 2.0));

        assert!(!pool.remove_matching(&tx("alice", 2.5)));
        assert!(!pool.remove_matching(&Transaction::new("alice", "bob", "cd", 2.0).unwrap()));
        assert!(pool.remove_matching(&tx("alice", 2.0)));
        assert!(pool.is_empty());
        // Second removal is tolerated
        assert!(!pool.remove_matching(&tx("alice", 2.0)));
    }

    #[test]
    fn test_remove_matching_drops_duplicates() {
        let mut pool = MemoryPool::new();
        pool.add(tx("alice", 2.0));
        pool.add(tx("carol", 1.0));
        pool.add(tx("alice", 2.0));

        assert!(pool.remove_matching(&tx("alice", 2.0)));
        assert_eq!(pool.get_all(), vec![tx("carol", 1.0)]);
    }

    #[test]
    fn test_pending_debits() {
        let mut pool = MemoryPool::new();
        pool.add(tx("alice", 2.0));
        pool.add(tx("alice", 1.5));
        pool.add(tx("carol", 9.0));

        assert_eq!(pool.pending_debits("alice"), 3.5);
        assert_eq!(pool.pending_debits("bob"), 0.0);
    }

    #[test]
    fn test_get_all_returns_a_copy() {
        let mut pool = MemoryPool::new();
        pool.add(tx("alice", 2.0));
        let mut copy = pool.get_all();
        copy.clear();
        assert_eq!(pool.len(), 1);
    }
}
