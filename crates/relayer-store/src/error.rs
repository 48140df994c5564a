use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum StoreError {
    #[snafu(display("store is closed"))]
    Closed,
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
