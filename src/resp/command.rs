use bytes::Bytes;
use smallvec::SmallVec;
use std::fmt::{self, Write};

/// Shortcut function for creating a command.
#[must_use]
#[inline(always)]
pub fn cmd(name: &'static str) -> Command {
    Command::new(name)
}

/// Generic command meant to be sent to the Redis server
#[derive(Debug, Clone)]
pub struct Command {
    pub name: Bytes,
    pub args: CommandArgs,
}

impl Command {
    /// Creates a new command.
    ///
    /// [`cmd`](crate::resp::cmd) function can be used as a shortcut.
    #[must_use]
    #[inline(always)]
    pub fn new(name: &'static str) -> Self {
        Self {
            name: Bytes::from_static(name.as_bytes()),
            args: CommandArgs::default(),
        }
    }

    /// Builds a command from a raw argv, the form replicated write commands
    /// arrive in. The first element is the command name.
    pub fn from_argv(argv: impl IntoIterator<Item = Bytes>) -> Option<Self> {
        let mut iter = argv.into_iter();
        let name = iter.next()?;

        Some(Self {
            name,
            args: CommandArgs {
                args: iter.collect(),
            },
        })
    }

    /// Builder function to add an argument to an existing command.
    #[must_use]
    #[inline(always)]
    pub fn arg(mut self, arg: impl ToArg) -> Self {
        self.args.args.push(arg.to_arg());
        self
    }

    /// Builder function to add an argument to an existing command, only if a condition is `true`.
    #[must_use]
    #[inline(always)]
    pub fn arg_if(self, condition: bool, arg: impl ToArg) -> Self {
        if condition { self.arg(arg) } else { self }
    }

    /// Number of bytes this command occupies on the wire once encoded.
    pub fn encoded_len(&self) -> usize {
        fn bulk_len(len: usize) -> usize {
            // $<len>\r\n<bytes>\r\n
            1 + itoa::Buffer::new().format(len).len() + 2 + len + 2
        }

        let mut len = 1 + itoa::Buffer::new().format(self.args.len() + 1).len() + 2;
        len += bulk_len(self.name.len());
        for arg in &self.args {
            len += bulk_len(arg.len());
        }
        len
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        String::from_utf8_lossy(&self.name).fmt(f)?;
        for arg in &self.args {
            f.write_char(' ')?;
            String::from_utf8_lossy(arg).fmt(f)?;
        }

        Ok(())
    }
}

/// Arguments of a [`Command`], kept as owned byte slices.
///
/// Dump payloads arrive as [`Bytes`] from the upstream parser and are moved
/// here without copying.
#[derive(Debug, Clone, Default)]
pub struct CommandArgs {
    pub(crate) args: SmallVec<[Bytes; 10]>,
}

impl CommandArgs {
    /// Returns the number of arguments currently written.
    #[inline]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns `true` if there is no argument
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Bytes> {
        self.args.iter()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.args.get(index)
    }
}

impl<'a> IntoIterator for &'a CommandArgs {
    type Item = &'a Bytes;
    type IntoIter = std::slice::Iter<'a, Bytes>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.args.iter()
    }
}

/// Types accepted as command arguments.
pub trait ToArg {
    fn to_arg(&self) -> Bytes;
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl ToArg for &Bytes {
    fn to_arg(&self) -> Bytes {
        (*self).clone()
    }
}

impl ToArg for &'static str {
    fn to_arg(&self) -> Bytes {
        Bytes::from_static(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        Bytes::from(self.clone().into_bytes())
    }
}

impl ToArg for &'static [u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::from_static(self)
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Bytes {
        Bytes::from(self.clone())
    }
}

macro_rules! to_arg_integer {
    ($($t:ty),*) => {
        $(
            impl ToArg for $t {
                fn to_arg(&self) -> Bytes {
                    Bytes::from(itoa::Buffer::new().format(*self).as_bytes().to_vec())
                }
            }
        )*
    };
}

to_arg_integer!(i32, u32, i64, u64, usize);

#[cfg(test)]
mod tests {
    use crate::resp::cmd;

    #[test]
    fn command() {
        let command = cmd("SET").arg("key").arg("value");
        assert_eq!(b"SET", command.name.as_ref());
        assert_eq!(Some(&b"key"[..]), command.args.get(0).map(|a| a.as_ref()));
        assert_eq!(Some(&b"value"[..]), command.args.get(1).map(|a| a.as_ref()));
        assert_eq!(None, command.args.get(2));

        let command = cmd("SELECT").arg(2usize);
        assert_eq!("SELECT 2", command.to_string());
    }
}
