//! Macros for declaring state and event identifier enums.

/// Generate a state identifier enum and its [`StateTag`](crate::StateTag)
/// implementation.
///
/// Variant names double as default display labels. The macro requires at
/// least one variant; machines additionally require at least two states at
/// construction time.
///
/// # Example
///
/// ```
/// use signalbox::state_tags;
///
/// state_tags! {
///     pub enum Turnstile {
///         Locked,
///         Unlocked,
///     }
/// }
/// ```
#[macro_export]
macro_rules! state_tags {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),+
        }

        impl $crate::StateTag for $name {
            const COUNT: usize = [$(stringify!($variant)),+].len();

            fn index(self) -> usize {
                self as usize
            }

            fn from_index(index: usize) -> Option<Self> {
                const ALL: &[$name] = &[$($name::$variant),+];
                ALL.get(index).copied()
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

/// Generate an event identifier enum and its [`EventTag`](crate::EventTag)
/// implementation.
///
/// Requires at least one variant; machines without external events use
/// [`NoEvent`](crate::NoEvent) instead.
///
/// # Example
///
/// ```
/// use signalbox::event_tags;
///
/// event_tags! {
///     pub enum Stimulus {
///         Push,
///         Coin,
///     }
/// }
/// ```
#[macro_export]
macro_rules! event_tags {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),+
        }

        impl $crate::EventTag for $name {
            const COUNT: usize = [$(stringify!($variant)),+].len();

            fn index(self) -> usize {
                self as usize
            }

            fn from_index(index: usize) -> Option<Self> {
                const ALL: &[$name] = &[$($name::$variant),+];
                ALL.get(index).copied()
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }
    };
}
