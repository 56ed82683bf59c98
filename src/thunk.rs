use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::ComputationFault;
use crate::force::Force;

type Body<'a, T> = Box<dyn FnOnce() -> anyhow::Result<T> + Send + 'a>;

/// Runs `body`, turning a panic into an error.
pub(crate) fn guarded<T>(body: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(panic) => Err(ComputationFault::from_panic(panic).into()),
    }
}

/// A one-shot cell holding the description of a computation until someone
/// forces it.
///
/// The body runs at most once, on whichever thread gets to the cell first.
/// Other threads forcing the same cell block until the result is published.
pub(crate) struct Suspension<'a, T> {
    value: OnceLock<Result<T, ComputationFault>>,
    body: Mutex<Option<Body<'a, T>>>,
    /// Set as soon as some thread starts evaluating the body.
    claimed: AtomicBool,
}

impl<'a, T> Suspension<'a, T> {
    pub(crate) fn new<F>(body: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'a,
    {
        Self {
            value: OnceLock::new(),
            body: Mutex::new(Some(Box::new(body))),
            claimed: AtomicBool::new(false),
        }
    }

    pub(crate) fn resolved(value: T) -> Self {
        Self {
            value: OnceLock::from(Ok(value)),
            body: Mutex::new(None),
            claimed: AtomicBool::new(true),
        }
    }

    /// Evaluates the body if nobody has done so yet. The flag tells whether
    /// this call was the one that ran it.
    pub(crate) fn evaluate(&self) -> (Result<&T, ComputationFault>, bool) {
        let mut ran = false;

        let value = self.value.get_or_init(|| {
            ran = true;
            self.claimed.store(true, Ordering::Release);
            let body = self
                .body
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();

            match body {
                Some(body) => guarded(body).map_err(ComputationFault::from),
                None => Err(ComputationFault::new(anyhow::anyhow!(
                    "suspension has no body to evaluate"
                ))),
            }
        });

        (value.as_ref().map_err(Clone::clone), ran)
    }

    /// Marks the cell as taken without waiting for anyone. Returns `false`
    /// if evaluation has already started elsewhere, in which case the caller
    /// must not block on it: the evaluating thread may be this very one,
    /// further down the stack.
    pub(crate) fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_evaluated(&self) -> bool {
        self.value.get().is_some()
    }

    pub(crate) fn get(&self) -> Option<&T> {
        self.value.get().and_then(|value| value.as_ref().ok())
    }

    /// Takes the result out of the cell. `None` if it was never evaluated.
    pub(crate) fn into_result(self) -> Option<Result<T, ComputationFault>> {
        self.value.into_inner()
    }
}

/// A lazily computed value that can be shared and forced from any thread.
///
/// A `Thunk` is the way to put deferred work *inside* a mapped value. When a
/// map call forces its outputs with [`ForcingDepth::Shallow`], thunks nested in
/// the output stay untouched and their work is paid later by whoever reads
/// them. With [`ForcingDepth::Deep`] every reachable thunk is evaluated on the
/// worker that produced the value.
///
/// ```
/// use sparkmap::Thunk;
///
/// let heavy = Thunk::new(|| (1..=10u64).product::<u64>());
/// assert!(!heavy.is_evaluated());
/// assert_eq!(*heavy.force().unwrap(), 3_628_800);
/// assert!(heavy.is_evaluated());
/// ```
///
/// [`ForcingDepth::Shallow`]: crate::ForcingDepth::Shallow
/// [`ForcingDepth::Deep`]: crate::ForcingDepth::Deep
pub struct Thunk<T>(Arc<Suspension<'static, T>>);

impl<T> Thunk<T> {
    /// Describes a computation without running it.
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self(Arc::new(Suspension::new(move || Ok(body()))))
    }

    /// Describes a computation that may fail.
    pub fn try_new<F, E>(body: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        Self(Arc::new(Suspension::new(move || body().map_err(Into::into))))
    }

    /// An already evaluated thunk.
    pub fn ready(value: T) -> Self {
        Self(Arc::new(Suspension::resolved(value)))
    }

    /// Evaluates the thunk (once) and returns its value.
    pub fn force(&self) -> Result<&T, ComputationFault> {
        self.0.evaluate().0
    }

    /// Whether the computation has run, successfully or not. Never forces.
    pub fn is_evaluated(&self) -> bool {
        self.0.is_evaluated()
    }

    /// The value, if it has been computed successfully. Never forces.
    pub fn get(&self) -> Option<&T> {
        self.0.get()
    }
}

impl<T> Clone for Thunk<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Force> Force for Thunk<T> {
    fn force_shallow(&self) -> Result<(), ComputationFault> {
        self.force()?.force_shallow()
    }

    fn force_deep(&self) -> Result<(), ComputationFault> {
        self.force()?.force_deep()
    }
}

impl<T: Debug> Debug for Thunk<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.value.get() {
            Some(Ok(value)) => f.debug_tuple("Thunk").field(value).finish(),
            Some(Err(err)) => write!(f, "Thunk(<fault: {err}>)"),
            None => write!(f, "Thunk(<unevaluated>)"),
        }
    }
}
