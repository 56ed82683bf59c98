use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ComputationFault, ConfigError};

/// How much of a produced value must be evaluated before it counts as ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ForcingDepth {
    /// Only the outermost form of the value is known. Thunks nested inside it
    /// may still be unevaluated.
    #[default]
    Shallow,
    /// The value and everything reachable from it is fully computed.
    Deep,
}

impl FromStr for ForcingDepth {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shallow" | "whnf" => Ok(ForcingDepth::Shallow),
            "deep" | "nf" => Ok(ForcingDepth::Deep),
            _ => Err(ConfigError::Depth(s.to_string())),
        }
    }
}

impl TryFrom<String> for ForcingDepth {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ForcingDepth> for String {
    fn from(value: ForcingDepth) -> Self {
        value.to_string()
    }
}

impl Display for ForcingDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForcingDepth::Shallow => write!(f, "shallow"),
            ForcingDepth::Deep => write!(f, "deep"),
        }
    }
}

/// Values that can be walked to a [`ForcingDepth`].
///
/// Plain Rust data is already evaluated once it exists, so for most types
/// shallow forcing has nothing to do and deep forcing only has to visit the
/// contents looking for [`Thunk`](crate::Thunk)s. Forcing is idempotent.
///
/// Implement it for your own output types by forwarding to the fields:
///
/// ```
/// use sparkmap::{ComputationFault, Force, Thunk};
///
/// struct Report {
///     name: String,
///     total: Thunk<u64>,
/// }
///
/// impl Force for Report {
///     fn force_deep(&self) -> Result<(), ComputationFault> {
///         self.name.force_deep()?;
///         self.total.force_deep()
///     }
/// }
/// ```
pub trait Force {
    /// Evaluates the outermost form of the value.
    fn force_shallow(&self) -> Result<(), ComputationFault> {
        Ok(())
    }

    /// Evaluates the value and everything reachable from it.
    fn force_deep(&self) -> Result<(), ComputationFault>;

    fn force(&self, depth: ForcingDepth) -> Result<(), ComputationFault> {
        match depth {
            ForcingDepth::Shallow => self.force_shallow(),
            ForcingDepth::Deep => self.force_deep(),
        }
    }
}

macro_rules! impl_strict {
    ($($T:ty),*) => {
        $(
            impl Force for $T {
                #[inline]
                fn force_deep(&self) -> Result<(), ComputationFault> {
                    Ok(())
                }
            }
        )*
    };
}

impl_strict!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, str
);

impl<T: Force + ?Sized> Force for &T {
    fn force_shallow(&self) -> Result<(), ComputationFault> {
        (**self).force_shallow()
    }

    fn force_deep(&self) -> Result<(), ComputationFault> {
        (**self).force_deep()
    }
}

impl<T: Force + ?Sized> Force for Box<T> {
    fn force_shallow(&self) -> Result<(), ComputationFault> {
        (**self).force_shallow()
    }

    fn force_deep(&self) -> Result<(), ComputationFault> {
        (**self).force_deep()
    }
}

impl<T: Force + ?Sized> Force for Rc<T> {
    fn force_shallow(&self) -> Result<(), ComputationFault> {
        (**self).force_shallow()
    }

    fn force_deep(&self) -> Result<(), ComputationFault> {
        (**self).force_deep()
    }
}

impl<T: Force + ?Sized> Force for Arc<T> {
    fn force_shallow(&self) -> Result<(), ComputationFault> {
        (**self).force_shallow()
    }

    fn force_deep(&self) -> Result<(), ComputationFault> {
        (**self).force_deep()
    }
}

impl<T: Force> Force for Option<T> {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        match self {
            Some(value) => value.force_deep(),
            None => Ok(()),
        }
    }
}

impl<T: Force, E: Force> Force for Result<T, E> {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        match self {
            Ok(value) => value.force_deep(),
            Err(err) => err.force_deep(),
        }
    }
}

impl<T: Force> Force for [T] {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        self.iter().try_for_each(Force::force_deep)
    }
}

impl<T: Force, const N: usize> Force for [T; N] {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        self.as_slice().force_deep()
    }
}

impl<T: Force> Force for Vec<T> {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        self.as_slice().force_deep()
    }
}

impl<T: Force> Force for VecDeque<T> {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        self.iter().try_for_each(Force::force_deep)
    }
}

impl<T: Force, S> Force for HashSet<T, S> {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        self.iter().try_for_each(Force::force_deep)
    }
}

impl<T: Force> Force for BTreeSet<T> {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        self.iter().try_for_each(Force::force_deep)
    }
}

impl<K: Force, V: Force, S> Force for HashMap<K, V, S> {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        self.iter().try_for_each(|(key, value)| {
            key.force_deep()?;
            value.force_deep()
        })
    }
}

impl<K: Force, V: Force> Force for BTreeMap<K, V> {
    fn force_deep(&self) -> Result<(), ComputationFault> {
        self.iter().try_for_each(|(key, value)| {
            key.force_deep()?;
            value.force_deep()
        })
    }
}

macro_rules! impl_tuple {
    ($($T:ident),*) => {
        #[allow(non_snake_case)]
        impl<$($T),*> Force for ($($T,)*)
        where
            $($T: Force),* {
            fn force_deep(&self) -> Result<(), ComputationFault> {
                let ($($T,)*) = self;
                $($T.force_deep()?;)*
                Ok(())
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);
impl_tuple!(A, B, C, D, E, F, G);
impl_tuple!(A, B, C, D, E, F, G, H);
impl_tuple!(A, B, C, D, E, F, G, H, I);
impl_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thunk;

    #[test]
    fn test_parse_depth() {
        assert_eq!("shallow".parse(), Ok(ForcingDepth::Shallow));
        assert_eq!(" Deep ".parse(), Ok(ForcingDepth::Deep));
        assert_eq!("nf".parse(), Ok(ForcingDepth::Deep));
        assert_eq!(
            "spine".parse::<ForcingDepth>(),
            Err(ConfigError::Depth("spine".into()))
        );
    }

    #[test]
    fn test_shallow_leaves_nested_thunks() {
        let value = vec![Thunk::ready(0u64), Thunk::new(|| 42u64)];

        value.force(ForcingDepth::Shallow).unwrap();
        assert!(!value[1].is_evaluated());

        value.force(ForcingDepth::Deep).unwrap();
        assert!(value.iter().all(Thunk::is_evaluated));
        assert_eq!(value[1].get(), Some(&42));
    }

    #[test]
    fn test_shallow_forces_outer_thunk_only() {
        let inner = Thunk::new(|| 1u8);
        let outer = {
            let inner = inner.clone();
            Thunk::new(move || Some(inner))
        };

        outer.force_shallow().unwrap();
        assert!(outer.is_evaluated());
        assert!(!inner.is_evaluated());

        outer.force_deep().unwrap();
        assert!(inner.is_evaluated());
    }

    #[test]
    fn test_deep_reaches_through_containers() {
        let mut map = BTreeMap::new();
        map.insert("a", (1, vec![Some(Thunk::new(|| "x".to_string()))]));
        let value = Arc::new(map);

        value.force_deep().unwrap();
        let (_, list) = &value["a"];
        assert!(list[0].as_ref().unwrap().is_evaluated());
    }

    #[test]
    fn test_deep_surfaces_fault() {
        let value = (
            1u32,
            [Thunk::<u32>::try_new(|| Err(anyhow::anyhow!("nested failure")))],
        );

        assert!(value.force(ForcingDepth::Shallow).is_ok());
        let err = value.force(ForcingDepth::Deep).unwrap_err();
        assert_eq!(err.to_string(), "nested failure");
    }
}
