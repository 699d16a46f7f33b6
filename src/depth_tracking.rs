use crate::error::{Error, Result};

/// Tracks how deeply groups are nested while walking a record tree.
#[derive(Clone, Debug)]
pub struct DepthTracker {
    depth: usize,
    limit: usize,
}

impl DepthTracker {
    /// Create a new depth tracker that allows `limit` levels of nested groups.
    pub fn new(limit: usize) -> Self {
        Self { depth: 0, limit }
    }

    /// Step into a group. Fails without changing depth if this would exceed the limit.
    pub fn enter(&mut self) -> Result<()> {
        // Check to see if we hit the nesting limit
        if self.depth >= self.limit {
            return Err(Error::ParseLimit(format!(
                "Group nesting deeper than {} levels",
                self.limit
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Step back out of a group.
    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

#[cfg(test)]
impl DepthTracker {
    fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn limit_enforced() {
        let mut tracker = DepthTracker::new(2);
        tracker.enter().unwrap();
        tracker.enter().unwrap();
        assert!(matches!(tracker.enter(), Err(Error::ParseLimit(_))));
        assert_eq!(tracker.depth(), 2);
        tracker.exit();
        tracker.enter().unwrap();
        tracker.exit();
        tracker.exit();
        tracker.exit();
        assert_eq!(tracker.depth(), 0);
    }
}
