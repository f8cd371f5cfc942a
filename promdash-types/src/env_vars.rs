pub const PROMDASH_PREFIX: &str = "PROMDASH";

#[doc(hidden)]
#[macro_export]
macro_rules! env_funs {
    ($var:expr) => {
        #[doc="Get value from the environment.\n"]
        #[doc="Returns `None` if the value was not found and fails if the value could not be parsed.\n"]
        #[doc="The name of the environment variable is \"PROMDASH_"]
        #[doc=$var]
        #[doc="\""]
        pub fn try_from_env() -> Result<Option<Self>, $crate::Error> {
            Self::try_from_env_prefixed($crate::PROMDASH_PREFIX)
        }

        #[doc="Get value from the environment.\n"]
        #[doc="Returns `None` if the value was not found and fails if the value could not be parsed.\n"]
        #[doc="The name of the environment variable is \"`prefix`_"]
        #[doc=$var]
        #[doc="\""]
        pub fn try_from_env_prefixed<T: Into<String>>(
            prefix: T,
        ) -> Result<Option<Self>, $crate::Error> {
            let mut var_name: String = prefix.into();
            var_name.push('_');
            var_name.push_str(&$var);
            Self::try_from_env_named(var_name)
        }

        #[doc="Get value from the environment.\n"]
        #[doc="Returns `None` if the value was not found and fails if the value could not be parsed.\n"]
        #[doc="The name of the environment variable is `var_name`."]
        pub fn try_from_env_named<T: AsRef<str>>(
            var_name: T,
        ) -> Result<Option<Self>, $crate::Error> {
            match std::env::var(var_name.as_ref()) {
                Ok(value) => value.parse().map(Some).map_err(|err| {
                    $crate::Error::new(format!(
                        "could not parse env var '{}': {}",
                        var_name.as_ref(),
                        err
                    ))
                }),
                Err(std::env::VarError::NotPresent) => Ok(None),
                Err(std::env::VarError::NotUnicode(_)) => Err($crate::Error::new(format!(
                    "env var '{}' is not unicode",
                    var_name.as_ref()
                ))),
            }
        }

        #[doc="Get value from the environment.\n"]
        #[doc="Fails if the value was not found or if the value could not be parsed.\n"]
        #[doc="The name of the environment variable is \"PROMDASH_"]
        #[doc=$var]
        #[doc="\""]
        pub fn from_env() -> Result<Self, $crate::Error> {
            Self::from_env_prefixed($crate::PROMDASH_PREFIX)
        }

        #[doc="Get value from the environment.\n"]
        #[doc="Fails if the value was not found or if the value could not be parsed.\n"]
        #[doc="The name of the environment variable is \"`prefix`_"]
        #[doc=$var]
        #[doc="\""]
        pub fn from_env_prefixed<T: Into<String>>(prefix: T) -> Result<Self, $crate::Error> {
            let mut var_name: String = prefix.into();
            var_name.push('_');
            var_name.push_str(&$var);
            Self::from_env_named(var_name)
        }

        #[doc="Get value from the environment.\n"]
        #[doc="Fails if the value was not found or if the value could not be parsed.\n"]
        #[doc="The name of the environment variable is `var_name`."]
        pub fn from_env_named<T: AsRef<str>>(var_name: T) -> Result<Self, $crate::Error> {
            Self::try_from_env_named(var_name.as_ref()).and_then(|v| {
                v.map(Ok).unwrap_or_else(|| {
                    Err($crate::Error::new(format!(
                        "env var '{}' not found",
                        var_name.as_ref()
                    )))
                })
            })
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __new_type_base {
    ($(#[$outer:meta])*; $Name:ident; $T:ty) => {
        $(#[$outer])*
        pub struct $Name($T);

        impl $Name {
            pub fn new<T: Into<$T>>(v: T) -> Self {
                Self(v.into())
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::write!(f, "{}", self.0)
            }
        }

        impl From<$Name> for $T {
            fn from(v: $Name) -> $T {
                v.0
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $crate::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($Name(s.parse().map_err(|err| {
                    $crate::Error::new(std::format!("could not parse {}: {}", s, err))
                })?))
            }
        }
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __new_type_base_clone_ext {
    ($Name:ident; $T:ty) => {
        impl $Name {
            pub fn into_inner(self) -> $T {
                self.0
            }

            pub fn as_inner(&self) -> &$T {
                &self.0
            }
        }

        impl From<$T> for $Name {
            fn from(v: $T) -> $Name {
                $Name(v)
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __new_type_base_string_ext {
    ($Name:ident) => {
        impl $Name {
            pub fn into_inner(self) -> String {
                self.0
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $Name {
            fn from(v: String) -> $Name {
                $Name(v)
            }
        }

        impl From<&str> for $Name {
            fn from(v: &str) -> $Name {
                $Name::new(v)
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }
    };
}

/// Declares a newtype with conversions, `Display` and `FromStr`.
///
/// `env="NAME"` adds constructors reading `PROMDASH_NAME` (or a custom
/// prefix) from the environment. `copy` newtypes wrap plain values and
/// `millis` newtypes additionally convert into a `Duration`.
#[macro_export]
macro_rules! new_type {
    ($(#[$outer:meta])* pub struct $Name:ident(String);) => {
        $crate::__new_type_base!($(#[$outer])*;$Name;String);
        $crate::__new_type_base_string_ext!($Name);
    };
    ($(#[$outer:meta])* pub struct $Name:ident(String, env=$env:expr);) => {
        $crate::__new_type_base!($(#[$outer])*;$Name;String);
        $crate::__new_type_base_string_ext!($Name);
        impl $Name {
            $crate::env_funs!($env);
        }
    };
    ($(#[$outer:meta])* pub copy struct $Name:ident($T:ty, env=$env:expr);) => {
        $crate::__new_type_base!($(#[$outer])*;$Name;$T);
        $crate::__new_type_base_clone_ext!($Name;$T);
        impl $Name {
            $crate::env_funs!($env);
        }
    };
    ($(#[$outer:meta])* pub millis struct $Name:ident($T:ty, env=$env:expr);) => {
        $crate::__new_type_base!($(#[$outer])*;$Name;$T);
        $crate::__new_type_base_clone_ext!($Name;$T);
        impl $Name {
            $crate::env_funs!($env);

            pub fn into_duration(self) -> std::time::Duration {
                std::time::Duration::from_millis(u64::from(self.0))
            }
        }

        impl From<$Name> for std::time::Duration {
            fn from(v: $Name) -> std::time::Duration {
                v.into_duration()
            }
        }
    };
    ($(#[$outer:meta])* pub struct $Name:ident($T:ty);) => {
        $crate::__new_type_base!($(#[$outer])*;$Name;$T);
        $crate::__new_type_base_clone_ext!($Name;$T);
    };
}
