use core::str::FromStr;

use embassy_sync::watch::{self, Watch};
use embedded_cli::arguments::FromArgumentError;
use postcard::experimental::max_size::MaxSize;
use serde::{Deserialize, Serialize};
use ufmt::{derive::uDebug, uDisplay, uwriteln};

pub type LogToggleSender = watch::DynSender<'static, LogToggles>;
pub type LogToggleReceiver = watch::DynReceiver<'static, LogToggles>;
pub type LogToggleWatcher<M, const N: usize> = Watch<M, LogToggles, N>;

macro_rules! log_toggles {
    ($($variant:ident, $enum:ident),*) => {
        #[derive(Clone, Debug, uDebug, Default, PartialEq, Eq, Serialize, Deserialize, MaxSize)]
        pub struct LogChannelToggles {
            $($variant: bool),+
        }

        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum LogChannel {
            $($enum),+
        }

        impl uDisplay for LogChannelToggles {
            fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
            where
                W: ufmt::uWrite + ?Sized,
            {
                uwriteln!(f, "Channel:       | Enabled:")?;
                uwriteln!(f, "---------------|---------")?;
                $(uwriteln!(f, "{} | {}", stringify!($variant), self.$variant)?;)+
                Ok(())
            }
        }

        impl LogChannelToggles {
            pub fn should_log(&self, channel: LogChannel) -> bool {
                match channel {
                    $(LogChannel::$enum => self.$variant),+
                }
            }

            pub fn set(&mut self, channel: &LogChannel, state: bool) {
                match channel {
                    $(LogChannel::$enum => self.$variant = state,)+
                }
            }
        }

        impl FromStr for LogChannel {
            type Err = ();
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $(stringify!($variant) => LogChannel::$enum,)+
                    $(stringify!($enum) => LogChannel::$enum,)+
                    _ => {
                        return Err(());
                    }
                })
            }
        }

        impl uDisplay for LogChannel {
            fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
            where
                W: ufmt::uWrite + ?Sized,
            {
                match self {
                    $(LogChannel::$enum => f.write_str(stringify!($enum)),)+
                }
            }
        }
    };
}

log_toggles!(samples, Samples, trigger, Trigger);

impl<'a> embedded_cli::arguments::FromArgument<'a> for LogChannel {
    fn from_arg(arg: &'a str) -> Result<Self, FromArgumentError<'a>>
    where
        Self: Sized,
    {
        arg.parse().map_err(|_| FromArgumentError {
            value: arg,
            expected: "a valid LogChannel enum variant",
        })
    }
}

#[derive(Clone, Debug, uDebug, Default)]
pub struct LogToggles {
    pub active: bool,
    pub config: LogChannelToggles,
}

impl LogToggles {
    pub fn should_log(&self, channel: LogChannel) -> bool {
        self.active && self.config.should_log(channel)
    }
}

/// Run `c` if `channel` is currently enabled. Nothing is logged until the
/// first set of toggles has been published.
pub fn may_log<C>(receiver: &mut LogToggleReceiver, channel: LogChannel, c: C)
where
    C: FnOnce(),
{
    if receiver
        .try_get()
        .is_some_and(|toggles| toggles.should_log(channel))
    {
        c();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    #[test]
    fn channel_names_parse() {
        assert_eq!("samples".parse(), Ok(LogChannel::Samples));
        assert_eq!("Trigger".parse(), Ok(LogChannel::Trigger));
        assert_eq!("bogus".parse::<LogChannel>(), Err(()));
        assert_eq!("storage".parse::<LogChannel>(), Err(()));
    }

    #[test]
    fn closed_console_gates_logging() {
        static WATCH: LogToggleWatcher<CriticalSectionRawMutex, 1> = Watch::new();
        let mut receiver = WATCH.dyn_receiver().unwrap();
        let mut hits = 0;
        may_log(&mut receiver, LogChannel::Samples, || hits += 1);
        assert_eq!(hits, 0);

        let mut config = LogChannelToggles::default();
        config.set(&LogChannel::Samples, true);
        WATCH.dyn_sender().send(LogToggles {
            active: true,
            config: config.clone(),
        });
        may_log(&mut receiver, LogChannel::Samples, || hits += 1);
        may_log(&mut receiver, LogChannel::Trigger, || hits += 1);
        assert_eq!(hits, 1);

        WATCH.dyn_sender().send(LogToggles {
            active: false,
            config,
        });
        may_log(&mut receiver, LogChannel::Samples, || hits += 1);
        assert_eq!(hits, 1);
    }
}
