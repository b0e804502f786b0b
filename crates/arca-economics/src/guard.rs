use crate::error::{EconomicsError, Result};

/// Exclusive re-entry guard held by every value-transferring entry point.
#[derive(Debug, Default, Clone)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) -> Result<()> {
        if self.entered {
            return Err(EconomicsError::Reentrant);
        }
        self.entered = true;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.entered = false;
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_entry_rejected() {
        let mut guard = ReentrancyGuard::new();
        guard.enter().unwrap();
        assert_eq!(guard.enter(), Err(EconomicsError::Reentrant));
        guard.exit();
        assert!(guard.enter().is_ok());
    }
}
