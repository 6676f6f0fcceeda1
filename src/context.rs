//! GL context management
//!
//! A `GlContext` is the ownership token carried in a `CanvasConfig`. The
//! first canvas built from a token claims it for its backend family and
//! starts a share group; later canvases built from clones of the token join
//! that group and create contexts sharing objects with it. A canvas of a
//! different family is refused with `IncompatibleShare`.
//!
//! Each `RenderContext` owns exactly one native context. Objects created in
//! a group stay alive until the last member context is dropped, so closing
//! one canvas never invalidates the contexts of the others.
//!
//! "Current" is tracked per thread. Making a context current on one thread
//! does not make it usable on another; calling `set_current` on two threads
//! with contexts of the same group at once is a race the caller must
//! serialize.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use serde::{Deserialize, Deserializer};

use crate::backend::NativeContext;
use crate::capability::{BackendFamily, Capabilities};
use crate::config::GlConfig;
use crate::error::{Error, Result};

thread_local! {
    static CURRENT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// Unique identifier for render contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

impl ContextId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ContextId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Context current on the calling thread, if any
pub fn current() -> Option<ContextId> {
    CURRENT.with(|c| c.get())
}

/// GL configuration plus context ownership token
///
/// Cloning shares the token.
#[derive(Clone)]
pub struct GlContext {
    inner: Rc<TokenInner>,
}

struct TokenInner {
    config: GlConfig,
    claim: RefCell<Option<Claim>>,
}

struct Claim {
    family: BackendFamily,
    group: Weak<dyn Any>,
}

impl GlContext {
    pub fn new(config: GlConfig) -> Self {
        Self {
            inner: Rc::new(TokenInner {
                config,
                claim: RefCell::new(None),
            }),
        }
    }

    /// Requested GL configuration
    pub fn config(&self) -> &GlConfig {
        &self.inner.config
    }

    /// Family currently owning this token
    ///
    /// The claim lapses once every context of the owning group is gone.
    pub fn owner(&self) -> Option<BackendFamily> {
        let claim = self.inner.claim.borrow();
        claim
            .as_ref()
            .filter(|c| c.group.strong_count() > 0)
            .map(|c| c.family)
    }

    /// Whether two tokens are the same
    pub fn same_token(&self, other: &GlContext) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Decide which share group a new canvas of `family` should join
    ///
    /// `None` means the canvas starts a fresh group.
    pub(crate) fn negotiate<C: NativeContext>(
        &self,
        family: BackendFamily,
        caps: &Capabilities,
    ) -> Result<Option<Rc<ShareGroup<C>>>> {
        let claim = self.inner.claim.borrow();
        let Some(claim) = claim.as_ref() else {
            return Ok(None);
        };
        let Some(group) = claim.group.upgrade() else {
            return Ok(None);
        };
        if claim.family != family {
            return Err(Error::IncompatibleShare {
                owner: claim.family,
                requested: family,
            });
        }
        if !caps.context {
            warn!(
                "{} backend cannot share GL contexts, creating an independent one",
                family
            );
            return Ok(None);
        }
        match group.downcast::<ShareGroup<C>>() {
            Ok(group) => Ok(Some(group)),
            Err(_) => Err(Error::IncompatibleShare {
                owner: claim.family,
                requested: family,
            }),
        }
    }

    /// Record `group` as the owner unless a live claim exists
    pub(crate) fn commit<C: NativeContext>(&self, family: BackendFamily, group: &Rc<ShareGroup<C>>) {
        let mut claim = self.inner.claim.borrow_mut();
        if claim.as_ref().is_some_and(|c| c.group.strong_count() > 0) {
            return;
        }
        let any: Rc<dyn Any> = group.clone();
        *claim = Some(Claim {
            family,
            group: Rc::downgrade(&any),
        });
        debug!("GL context token claimed by {} (group {})", family, group.id());
    }
}

impl Default for GlContext {
    fn default() -> Self {
        GlContext::new(GlConfig::default())
    }
}

impl fmt::Debug for GlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlContext")
            .field("config", &self.inner.config)
            .field("owner", &self.owner())
            .finish()
    }
}

impl<'de> Deserialize<'de> for GlContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        GlConfig::deserialize(deserializer).map(GlContext::new)
    }
}

/// Set of native contexts sharing GL objects
pub struct ShareGroup<C: NativeContext> {
    id: u64,
    members: RefCell<Vec<Weak<C>>>,
}

impl<C: NativeContext> ShareGroup<C> {
    fn new() -> Rc<Self> {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Rc::new(Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            members: RefCell::new(Vec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// A live member to share against
    pub fn anchor(&self) -> Option<Rc<C>> {
        self.members.borrow().iter().find_map(Weak::upgrade)
    }

    /// Number of live member contexts
    pub fn len(&self) -> usize {
        self.members
            .borrow()
            .iter()
            .filter(|m| m.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn join(&self, member: &Rc<C>) {
        let mut members = self.members.borrow_mut();
        members.retain(|m| m.strong_count() > 0);
        members.push(Rc::downgrade(member));
    }
}

/// A native GL context bound to one canvas drawable
pub struct RenderContext<C: NativeContext> {
    id: ContextId,
    native: Rc<C>,
    group: Rc<ShareGroup<C>>,
}

impl<C: NativeContext> RenderContext<C> {
    /// Create the context for a new canvas
    ///
    /// `create` receives the context to share against, if any, and returns
    /// the native drawable together with its context. The token is claimed
    /// only after `create` succeeds, so a failed construction leaves no
    /// trace.
    pub(crate) fn establish<W>(
        token: &GlContext,
        family: BackendFamily,
        caps: &Capabilities,
        create: impl FnOnce(Option<&C>) -> Result<(W, C)>,
    ) -> Result<(W, Self)> {
        let group = token.negotiate::<C>(family, caps)?;
        let anchor = group.as_ref().and_then(|g| g.anchor());
        let (window, native) = create(anchor.as_deref())?;
        let group = group.unwrap_or_else(ShareGroup::new);

        let native = Rc::new(native);
        group.join(&native);
        token.commit(family, &group);

        let context = RenderContext {
            id: ContextId::new(),
            native,
            group,
        };
        debug!(
            "Created render context {:?} in group {} ({} member(s))",
            context.id,
            context.group.id(),
            context.group.len()
        );
        Ok((window, context))
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The platform context
    pub fn native(&self) -> &C {
        &self.native
    }

    pub fn group(&self) -> &ShareGroup<C> {
        &self.group
    }

    /// Whether another context is in the same share group
    pub fn shares_with(&self, other: &RenderContext<C>) -> bool {
        Rc::ptr_eq(&self.group, &other.group)
    }

    /// Whether this context is current on the calling thread
    pub fn is_current(&self) -> bool {
        current() == Some(self.id)
    }

    /// Bind this context on the calling thread
    pub fn make_current(&self) -> Result<()> {
        if self.is_current() {
            return Ok(());
        }
        self.native.make_current()?;
        CURRENT.with(|c| c.set(Some(self.id)));
        Ok(())
    }

    /// Swap the drawable's buffers, binding this context first
    pub fn swap_buffers(&self) -> Result<()> {
        self.make_current()?;
        self.native.swap_buffers()
    }
}

impl<C: NativeContext> Drop for RenderContext<C> {
    fn drop(&mut self) {
        if self.is_current() {
            self.native.release_current();
            CURRENT.with(|c| c.set(None));
        }
        debug!("Dropping render context {:?}", self.id);
    }
}

impl<C: NativeContext> fmt::Debug for RenderContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("id", &self.id)
            .field("group", &self.group.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeContext {
        binds: Cell<u32>,
        swaps: Cell<u32>,
        released: Cell<bool>,
        shared: bool,
    }

    impl NativeContext for FakeContext {
        fn make_current(&self) -> Result<()> {
            self.binds.set(self.binds.get() + 1);
            Ok(())
        }

        fn swap_buffers(&self) -> Result<()> {
            self.swaps.set(self.swaps.get() + 1);
            Ok(())
        }

        fn release_current(&self) {
            self.released.set(true);
        }
    }

    fn build(token: &GlContext, family: BackendFamily) -> Result<RenderContext<FakeContext>> {
        RenderContext::establish(token, family, Capabilities::for_family(family), |share| {
            Ok((
                (),
                FakeContext {
                    shared: share.is_some(),
                    ..FakeContext::default()
                },
            ))
        })
        .map(|(_, ctx)| ctx)
    }

    #[test]
    fn test_first_claims_then_shares() {
        let token = GlContext::default();
        assert_eq!(token.owner(), None);

        let a = build(&token, BackendFamily::Native).unwrap();
        assert!(!a.native().shared);
        assert_eq!(token.owner(), Some(BackendFamily::Native));

        let b = build(&token.clone(), BackendFamily::Native).unwrap();
        assert!(b.native().shared);
        assert!(a.shares_with(&b));
        assert_eq!(a.group().len(), 2);
    }

    #[test]
    fn test_other_family_is_refused() {
        let token = GlContext::default();
        let _a = build(&token, BackendFamily::Gtk).unwrap();
        let err = build(&token, BackendFamily::Native).unwrap_err();
        assert!(matches!(
            err,
            Error::IncompatibleShare {
                owner: BackendFamily::Gtk,
                requested: BackendFamily::Native
            }
        ));
    }

    #[test]
    fn test_no_sharing_backend_gets_independent_group() {
        let token = GlContext::default();
        let a = build(&token, BackendFamily::Game).unwrap();
        let b = build(&token, BackendFamily::Game).unwrap();
        assert!(!b.native().shared);
        assert!(!a.shares_with(&b));
        assert_eq!(token.owner(), Some(BackendFamily::Game));
    }

    #[test]
    fn test_claim_lapses_when_group_dies() {
        let token = GlContext::default();
        let a = build(&token, BackendFamily::Gtk).unwrap();
        drop(a);
        assert_eq!(token.owner(), None);
        assert!(build(&token, BackendFamily::Native).is_ok());
    }

    #[test]
    fn test_failed_creation_leaves_token_unclaimed() {
        let token = GlContext::default();
        let result = RenderContext::<FakeContext>::establish(
            &token,
            BackendFamily::Native,
            &Capabilities::NATIVE,
            |_| -> Result<((), FakeContext)> {
                Err(Error::ContextCreationFailed("no visual".into()))
            },
        );
        assert!(result.is_err());
        assert_eq!(token.owner(), None);
    }

    #[test]
    fn test_group_survives_first_member() {
        let token = GlContext::default();
        let a = build(&token, BackendFamily::Native).unwrap();
        let b = build(&token, BackendFamily::Native).unwrap();
        drop(a);
        assert_eq!(b.group().len(), 1);
        assert_eq!(token.owner(), Some(BackendFamily::Native));
        let c = build(&token, BackendFamily::Native).unwrap();
        assert!(c.shares_with(&b));
    }

    #[test]
    fn test_current_tracking() {
        let token = GlContext::default();
        let a = build(&token, BackendFamily::Native).unwrap();
        let b = build(&token, BackendFamily::Native).unwrap();

        a.make_current().unwrap();
        a.make_current().unwrap();
        assert_eq!(a.native().binds.get(), 1);
        assert!(a.is_current());

        b.swap_buffers().unwrap();
        assert!(b.is_current());
        assert!(!a.is_current());
        assert_eq!(b.native().swaps.get(), 1);

        let b_native = b.native.clone();
        drop(b);
        assert!(b_native.released.get());
        assert_eq!(current(), None);
    }
}
