use crate::errors::HDocResult;
use crate::store::Row;

/// Backend side of a [RowScanner].
///
/// `close` releases whatever the scan holds open and may be called more than once.
pub trait RowScannerProvider: Send {
    fn next_row(&mut self) -> Option<HDocResult<Row>>;

    fn close(&mut self);
}

/// A forward-only, single-pass scan over store rows.
///
/// The scanner closes its provider when the scan is exhausted, when it yields an error,
/// when [RowScanner::close] is called, and when it is dropped.
pub struct RowScanner {
    provider: Box<dyn RowScannerProvider>,
    closed: bool,
}

impl RowScanner {
    pub fn new<T: RowScannerProvider + 'static>(provider: T) -> Self {
        RowScanner {
            provider: Box::new(provider),
            closed: false,
        }
    }

    /// A scanner over rows that are already in memory.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        RowScanner::new(VecRowProvider {
            rows: rows.into_iter(),
        })
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.provider.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for RowScanner {
    type Item = HDocResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        match self.provider.next_row() {
            Some(Ok(row)) => Some(Ok(row)),
            Some(Err(err)) => {
                self.close();
                Some(Err(err))
            }
            None => {
                self.close();
                None
            }
        }
    }
}

impl Drop for RowScanner {
    fn drop(&mut self) {
        self.close();
    }
}

struct VecRowProvider {
    rows: std::vec::IntoIter<Row>,
}

impl RowScannerProvider for VecRowProvider {
    fn next_row(&mut self) -> Option<HDocResult<Row>> {
        self.rows.next().map(Ok)
    }

    fn close(&mut self) {
        self.rows = Vec::new().into_iter();
    }
}
