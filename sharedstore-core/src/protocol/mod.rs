/*
    Protocol subsystem - envelopes, ports and listener dispatch

    Everything that crosses a context boundary goes through here.
*/

pub mod adapter;
pub mod envelope;
pub mod error;
pub mod port;

pub use adapter::{ChannelAdapter, Delivery};
pub use envelope::{Envelope, Operation, API_TAG};
pub use error::{ChannelError, ProtocolError};
pub use port::{MessagePort, PortSender};
