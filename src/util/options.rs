use std::fmt;
use std::str::FromStr;

use crate::util::constants::DEFAULT_SCAN_INTERVAL_MS;

/// The access distribution a client draws its offsets from. An opaque tag as
/// far as the core is concerned; the workload generator interprets it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessPattern {
    /// Every offset equally likely.
    Uniform,
    /// Offsets in address order, wrapping around.
    Sequential,
    /// 90% of accesses fall into the first tenth of the space.
    Hotspot,
}

impl FromStr for AccessPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(AccessPattern::Uniform),
            "sequential" => Ok(AccessPattern::Sequential),
            "hotspot" => Ok(AccessPattern::Hotspot),
            _ => Err(format!("unknown access pattern '{}'", s)),
        }
    }
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessPattern::Uniform => write!(f, "uniform"),
            AccessPattern::Sequential => write!(f, "sequential"),
            AccessPattern::Hotspot => write!(f, "hotspot"),
        }
    }
}

/// One synthetic client: the size of its logical address space in pages and
/// the distribution it draws offsets from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClientSpec {
    pub addr_space_pages: usize,
    pub pattern: AccessPattern,
}

/// Option value describing every client.
///
/// The format is
/// ```text
/// <client>  ::= <pages> "," <pattern>
/// <clients> ::= <client> ";" <clients> | <client>
/// ```
/// e.g. `4096,uniform;4096,hotspot`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSpecs {
    pub specs: Vec<ClientSpec>,
}

impl ClientSpecs {
    fn parse_clients(s: &str) -> Result<Vec<ClientSpec>, String> {
        s.split(';')
            .filter(|c| !c.is_empty())
            .map(|c| {
                let fields: Vec<&str> = c.split(',').collect();
                if fields.len() != 2 {
                    Err("please supply (pages, pattern)".into())
                } else {
                    let addr_space_pages = fields[0]
                        .trim()
                        .parse()
                        .map_err(|_| String::from("failed to parse page count"))?;
                    let pattern = fields[1].trim().parse()?;
                    Ok(ClientSpec {
                        addr_space_pages,
                        pattern,
                    })
                }
            })
            .collect()
    }

    /// Total pages across all clients. This is the size of the logical
    /// address space the server must back.
    pub fn total_pages(&self) -> usize {
        self.specs.iter().map(|c| c.addr_space_pages).sum()
    }
}

impl FromStr for ClientSpecs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientSpecs::parse_clients(s).map(|specs| ClientSpecs { specs })
    }
}

fn always_valid<T>(_: &T) -> bool {
    true
}

/// An option of a given type, with metadata about how it may be set.
#[derive(Debug, Clone)]
pub struct TierMemOption<T: Clone> {
    pub value: T,
    /// Can we set this option through env vars?
    pub from_env_var: bool,
    /// Can we set this option through the command line/API?
    pub from_command_line: bool,
}

// Dereference an option to get its value.
impl<T: Clone> std::ops::Deref for TierMemOption<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

macro_rules! options {
    // Verify whether we can set an option through env var or command line.
    (@verify_set_from($self: expr, $key: expr, $verify_field: ident, $($name: ident),*)) => {
        match $key {
            $(stringify!($name) => { assert!($self.$name.$verify_field, "cannot set option {} (not {})", $key, stringify!($verify_field)) }),*
            _ => panic!("Invalid Options key: {}", $key)
        }
    };

    ($($(#[$outer:meta])*$name:ident: $type:ty [env_var: $env_var:expr, command_line: $command_line:expr] [$validator:expr] = $default:expr),*,) => [
        options!($($(#[$outer])*$name: $type [env_var: $env_var, command_line: $command_line] [$validator] = $default),*);
    ];
    ($($(#[$outer:meta])*$name:ident: $type:ty [env_var: $env_var:expr, command_line: $command_line:expr] [$validator:expr] = $default:expr),*) => [
        /// The runtime options for a TierMem instance.
        #[derive(Clone)]
        pub struct Options {
            $($(#[$outer])*pub $name: TierMemOption<$type>),*
        }
        impl Options {
            /// Set an option from an env var.
            pub fn set_from_env_var(&mut self, s: &str, val: &str) -> bool {
                options!(@verify_set_from(self, s, from_env_var, $($name),*));
                self.set_inner(s, val)
            }

            /// Set an option from the command line/API.
            pub fn set_from_command_line(&mut self, s: &str, val: &str) -> bool {
                options!(@verify_set_from(self, s, from_command_line, $($name),*));
                self.set_inner(s, val)
            }

            /// Bulk set options from a whitespace-separated `key=value` string,
            /// such as `buffer_size=4 message_count=1000`. Returns false if any
            /// pair is malformed or invalid.
            pub fn set_bulk_from_command_line(&mut self, options: &str) -> bool {
                for opt in options.split_ascii_whitespace() {
                    let kv_pair: Vec<&str> = opt.split('=').collect();
                    if kv_pair.len() != 2 {
                        return false;
                    }
                    if !self.set_from_command_line(kv_pair[0], kv_pair[1]) {
                        return false;
                    }
                }
                true
            }

            /// Apply any `TIERMEM_*` env var that matches an option name.
            pub fn read_env_var_settings(&mut self) {
                const PREFIX: &str = "TIERMEM_";
                for (key, val) in std::env::vars() {
                    if let Some(rest_of_key) = key.strip_prefix(PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { self.set_from_env_var(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
            }

            /// Set an option and run its validator on the parsed value.
            fn set_inner(&mut self, s: &str, val: &str) -> bool {
                match s {
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            self.$name.value = val.clone();
                        } else {
                            eprintln!("Warn: unable to set {}={:?}. Invalid value. Default value will be used.", s, val);
                        }
                        is_valid
                    } else {
                        eprintln!("Warn: unable to set {}={:?}. Cant parse value. Default value will be used.", s, val);
                        false
                    })*
                    _ => panic!("Invalid Options key: {}", s)
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                Options {
                    $($name: TierMemOption {
                        value: $default,
                        from_env_var: $env_var,
                        from_command_line: $command_line,
                    }),*
                }
            }
        }
    ]
}

options! {
    /// Capacity, in messages, of each of the two queues.
    buffer_size:      usize       [env_var: true, command_line: true] [|v: &usize| *v > 0] = 1024,
    /// The synthetic clients and their address spaces.
    clients:          ClientSpecs [env_var: true, command_line: true] [|v: &ClientSpecs| !v.specs.is_empty() && v.total_pages() > 0]
        = ClientSpecs { specs: vec![
            ClientSpec { addr_space_pages: 4096, pattern: AccessPattern::Uniform },
            ClientSpec { addr_space_pages: 4096, pattern: AccessPattern::Uniform },
        ] },
    /// Messages each client produces before it exits.
    message_count:    usize       [env_var: true, command_line: true] [always_valid] = 10000,
    /// Pages backed by the local NUMA node.
    local_pages:      usize       [env_var: true, command_line: true] [always_valid] = 2048,
    /// Pages backed by the remote NUMA node.
    remote_pages:     usize       [env_var: true, command_line: true] [always_valid] = 2048,
    /// Pages backed by persistent memory.
    pmem_pages:       usize       [env_var: true, command_line: true] [always_valid] = 4096,
    /// A page is hot once its access count reaches this threshold.
    hot_access_cnt:   usize       [env_var: true, command_line: true] [|v: &usize| *v > 0] = 10,
    /// A page is cold once it has not been touched for this many milliseconds.
    cold_interval_ms: u64         [env_var: true, command_line: true] [|v: &u64| *v > 0] = 1000,
    /// Delay between two scanner steps, in milliseconds.
    scan_interval_ms: u64         [env_var: true, command_line: true] [always_valid] = DEFAULT_SCAN_INTERVAL_MS,
    /// NUMA node id backing the local tier.
    local_node:       usize       [env_var: true, command_line: true] [always_valid] = 0,
    /// NUMA node id backing the remote tier.
    remote_node:      usize       [env_var: true, command_line: true] [always_valid] = 1,
    /// NUMA node id backing the PMEM tier.
    pmem_node:        usize       [env_var: true, command_line: true] [always_valid] = 2,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util::{serial_test, with_cleanup};

    #[test]
    fn no_env_var() {
        serial_test(|| {
            let options = Options::default();
            assert_eq!(*options.buffer_size, 1024);
            assert_eq!(*options.hot_access_cnt, 10);
        })
    }

    #[test]
    fn with_valid_env_var() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("TIERMEM_BUFFER_SIZE", "4");
                    let mut options = Options::default();
                    options.read_env_var_settings();
                    assert_eq!(*options.buffer_size, 4);
                },
                || {
                    std::env::remove_var("TIERMEM_BUFFER_SIZE");
                },
            )
        })
    }

    #[test]
    fn with_invalid_env_var_value() {
        serial_test(|| {
            with_cleanup(
                || {
                    // We cannot parse the value, so use the default.
                    std::env::set_var("TIERMEM_BUFFER_SIZE", "abc");
                    let mut options = Options::default();
                    options.read_env_var_settings();
                    assert_eq!(*options.buffer_size, 1024);
                },
                || {
                    std::env::remove_var("TIERMEM_BUFFER_SIZE");
                },
            )
        })
    }

    #[test]
    fn rejected_value_keeps_default() {
        serial_test(|| {
            let mut options = Options::default();
            assert!(!options.set_from_command_line("buffer_size", "0"));
            assert_eq!(*options.buffer_size, 1024);
        })
    }

    #[test]
    fn set_bulk() {
        serial_test(|| {
            let mut options = Options::default();
            assert!(options.set_bulk_from_command_line("buffer_size=2 hot_access_cnt=5"));
            assert_eq!(*options.buffer_size, 2);
            assert_eq!(*options.hot_access_cnt, 5);
            assert!(!options.set_bulk_from_command_line("buffer_size"));
        })
    }

    #[test]
    fn parse_client_specs() {
        serial_test(|| {
            let specs: ClientSpecs = "16,uniform;8,hotspot".parse().unwrap();
            assert_eq!(
                specs.specs,
                vec![
                    ClientSpec { addr_space_pages: 16, pattern: AccessPattern::Uniform },
                    ClientSpec { addr_space_pages: 8, pattern: AccessPattern::Hotspot },
                ]
            );
            assert_eq!(specs.total_pages(), 24);
            assert!("16".parse::<ClientSpecs>().is_err());
            assert!("x,uniform".parse::<ClientSpecs>().is_err());
            assert!("16,zipf".parse::<ClientSpecs>().is_err());
        })
    }
}
