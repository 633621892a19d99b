use crate::{
    Result,
    resp::{Command, CommandArgs},
};
use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

pub struct CommandEncoder;

impl Encoder<&Command> for CommandEncoder {
    type Error = crate::Error;

    #[inline]
    fn encode(&mut self, command: &Command, buf: &mut BytesMut) -> Result<()> {
        buf.reserve(command.encoded_len());
        buf.put_u8(b'*');
        encode_integer(command.args.len() as i64 + 1, buf);
        encode_crlf(buf);
        encode_bulkstring(&command.name, buf);
        encode_command_args(&command.args, buf);
        Ok(())
    }
}

#[inline]
fn encode_bulkstring(arg: &[u8], buf: &mut BytesMut) {
    buf.put_u8(b'$');
    encode_integer(arg.len() as i64, buf);
    encode_crlf(buf);
    buf.put(arg);
    encode_crlf(buf);
}

#[inline]
fn encode_command_args(args: &CommandArgs, buf: &mut BytesMut) {
    for arg in args {
        encode_bulkstring(arg, buf);
    }
}

#[inline]
fn encode_integer(i: i64, buf: &mut BytesMut) {
    let mut buffer = itoa::Buffer::new();
    let str = buffer.format(i);
    buf.put(str.as_bytes());
}

#[inline]
fn encode_crlf(buf: &mut BytesMut) {
    buf.put(&b"\r\n"[..]);
}

#[cfg(test)]
mod tests {
    use super::CommandEncoder;
    use crate::resp::cmd;
    use bytes::BytesMut;
    use tokio_util::codec::Encoder;

    #[test]
    fn multi_bulk() {
        let command = cmd("RESTORE").arg("key").arg(0usize).arg("payload");
        let mut buf = BytesMut::new();
        CommandEncoder.encode(&command, &mut buf).unwrap();
        assert_eq!(
            b"*4\r\n$7\r\nRESTORE\r\n$3\r\nkey\r\n$1\r\n0\r\n$7\r\npayload\r\n".as_ref(),
            buf.as_ref()
        );
        assert_eq!(command.encoded_len(), buf.len());
    }
}
