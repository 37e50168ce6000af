/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend refused the request.
    Rejected,
    /// A connection-level failure.
    Transport,
    /// The backend sent something the client cannot interpret.
    Protocol,
    /// Any other errors.
    Other,
}
