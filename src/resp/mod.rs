/*!
RESP is the [Redis Serialization Protocol](https://redis.io/docs/reference/protocol-spec/).

This module holds the wire codec of the engine: [`Command`] and its
[`CommandEncoder`] on the outbound side, [`Value`] and its [`ValueDecoder`]
on the inbound side. Only the five reply kinds a RESP2 server produces are
modeled; error replies decode to [`Value::Error`] and are a reply class,
not a transport fault.
*/
mod command;
mod command_encoder;
mod value;
mod value_decoder;

pub use command::*;
pub use command_encoder::*;
pub use value::*;
pub use value_decoder::*;
