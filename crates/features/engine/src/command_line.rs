use indexmap::IndexMap;
use std::fmt;

/// Marks a switch on the command line and in usage summaries.
pub const SWITCH_PREFIX: &str = "--";
const SWITCH_VALUE_SEPARATOR: char = '=';
const END_OF_SWITCHES: &str = "--";

/// A process command line: program, ordered switch map, positional arguments.
///
/// Re-appending an existing switch replaces its value in place, so a switch
/// appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    switches: IndexMap<String, String>,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), ..Self::default() }
    }

    /// Parses `argv`, whose first element is the program.
    ///
    /// `--name=value` and `--name` become switches; everything after a bare
    /// `--` is positional.
    pub fn from_args<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let mut line = Self::new(argv.next().unwrap_or_default());
        let mut switches_done = false;

        for arg in argv {
            if switches_done {
                line.args.push(arg);
                continue;
            }
            if arg == END_OF_SWITCHES {
                switches_done = true;
                continue;
            }
            match arg.strip_prefix(SWITCH_PREFIX) {
                Some(switch) if !switch.is_empty() => match switch.split_once(SWITCH_VALUE_SEPARATOR) {
                    Some((name, value)) => line.append_switch_value(name, value),
                    None => line.append_switch(switch),
                },
                _ => line.args.push(arg),
            }
        }
        line
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub const fn switches(&self) -> &IndexMap<String, String> {
        &self.switches
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn has_switch(&self, name: &str) -> bool {
        self.switches.contains_key(name)
    }

    /// Value of `name`, empty when absent or valueless.
    #[must_use]
    pub fn switch_value(&self, name: &str) -> &str {
        self.switches.get(name).map_or("", String::as_str)
    }

    pub fn append_switch(&mut self, name: impl Into<String>) {
        self.append_switch_value(name, String::new());
    }

    pub fn append_switch_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.switches.insert(name.into(), value.into());
    }

    pub fn append_arg(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    /// Removes `name`, keeping the order of the remaining switches.
    pub fn remove_switch(&mut self, name: &str) -> Option<String> {
        self.switches.shift_remove(name)
    }

    /// Serialized form, program first.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let switches = self.switches.iter().map(|(name, value)| {
            if value.is_empty() {
                format!("{SWITCH_PREFIX}{name}")
            } else {
                format!("{SWITCH_PREFIX}{name}{SWITCH_VALUE_SEPARATOR}{value}")
            }
        });
        let mut argv: Vec<String> = std::iter::once(self.program.clone()).chain(switches).collect();
        if !self.args.is_empty() {
            argv.push(END_OF_SWITCHES.to_owned());
            argv.extend(self.args.iter().cloned());
        }
        argv
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Splits a `--enable-features` style value into its entries.
#[must_use]
pub fn split_feature_list(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}
