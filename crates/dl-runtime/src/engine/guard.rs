use dl_core::{DicelangError, ErrorKind};

/// Bounded step counter for loops, exponentiation and dice draws.
#[derive(Debug)]
pub(crate) struct Guard {
    kind: ErrorKind,
    limit: u64,
    count: u64,
}

impl Guard {
    pub(crate) fn new(kind: ErrorKind, limit: u64) -> Self {
        Self {
            kind,
            limit,
            count: 0,
        }
    }

    /// Claims one more step, failing once `limit` steps have been taken.
    pub(crate) fn tick(&mut self) -> Result<(), DicelangError> {
        if self.count >= self.limit {
            return Err(DicelangError::timeout(self.kind, self.count));
        }
        self.count += 1;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}
