//! Macros for ergonomic state machine construction.

/// Generate a state enum and its `State` trait implementation.
///
/// `start:` names the variant every run begins in, `done:` the terminal
/// variant. The enum derives everything `State` needs, so the calling crate
/// must depend on `serde` with the `derive` feature.
///
/// # Example
///
/// ```
/// use switchyard::core::State;
/// use switchyard::state_enum;
///
/// state_enum! {
///     pub enum Deploy {
///         Plan,
///         Build,
///         Ship,
///         Finished,
///     }
///     start: Plan
///     done: Finished
/// }
///
/// assert_eq!(Deploy::start(), Deploy::Plan);
/// assert!(Deploy::Finished.is_done());
/// assert_eq!(Deploy::Build.name(), "Build");
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        start: $start:ident $(,)?
        done: $done:ident $(,)?
    ) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Debug,
            serde::Serialize,
            serde::Deserialize
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn start() -> Self {
                Self::$start
            }

            fn done() -> Self {
                Self::$done
            }
        }
    };
}
