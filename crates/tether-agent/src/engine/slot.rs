//! Exclusive ownership of the interpreter's debugging session.
//!
//! The interpreter offers one debugging session per process. A
//! [`SessionSlot`] creates it on first use and hands it out as a
//! [`SessionLease`]; while a lease is alive nobody else can acquire the
//! session. [`SessionSlot::replace`] tears the current session down even if
//! it is leased, which turns the old lease into a dead handle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info};

use crate::error::SessionError;
use crate::inspector::{
    InspectorSession, InstalledLocation, NativeBreakpointId, NativeTarget, SessionFactory,
};

struct Holder {
    session: RefCell<Box<dyn InspectorSession>>,
    revoked: Cell<bool>,
    held: Cell<bool>,
}

impl Holder {
    fn new(session: Box<dyn InspectorSession>) -> Rc<Self> {
        Rc::new(Self {
            session: RefCell::new(session),
            revoked: Cell::new(false),
            held: Cell::new(false),
        })
    }

    fn revoke(&self) {
        if !self.revoked.replace(true) {
            self.session.borrow_mut().disconnect();
        }
    }
}

pub struct SessionSlot {
    factory: RefCell<Box<dyn SessionFactory>>,
    current: RefCell<Option<Rc<Holder>>>,
}

impl std::fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSlot")
            .field("connected", &self.is_connected())
            .field("held", &self.is_held())
            .finish()
    }
}

impl SessionSlot {
    pub fn new(factory: impl SessionFactory + 'static) -> Rc<Self> {
        Rc::new(Self {
            factory: RefCell::new(Box::new(factory)),
            current: RefCell::new(None),
        })
    }

    /// Take the session, connecting one if there is none.
    pub fn acquire(self: &Rc<Self>) -> Result<SessionLease, SessionError> {
        let mut current = self.current.borrow_mut();
        let existing = current
            .as_ref()
            .filter(|holder| !holder.revoked.get())
            .cloned();
        let holder = match existing {
            Some(holder) if holder.held.get() => return Err(SessionError::Busy),
            Some(holder) => holder,
            None => {
                let holder = Holder::new(self.factory.borrow_mut().connect()?);
                debug!("connected debugging session");
                *current = Some(Rc::clone(&holder));
                holder
            }
        };
        holder.held.set(true);
        Ok(SessionLease {
            slot: Rc::clone(self),
            holder,
        })
    }

    /// Disconnect the current session (leased or not) and connect a new,
    /// unheld one in its place.
    pub fn replace(&self) -> Result<(), SessionError> {
        let previous = self.current.borrow_mut().take();
        if let Some(previous) = previous {
            previous.revoke();
            info!("replaced debugging session");
        }
        let holder = Holder::new(self.factory.borrow_mut().connect()?);
        *self.current.borrow_mut() = Some(holder);
        Ok(())
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|holder| holder.held.get() && !holder.revoked.get())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|holder| !holder.revoked.get())
    }
}

/// Exclusive access to the debugging session.
pub struct SessionLease {
    slot: Rc<SessionSlot>,
    holder: Rc<Holder>,
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease")
            .field("revoked", &self.holder.revoked.get())
            .finish()
    }
}

impl SessionLease {
    fn live(&self) -> Result<(), SessionError> {
        if self.holder.revoked.get() {
            Err(SessionError::Disconnected)
        } else {
            Ok(())
        }
    }

    pub fn set_breakpoint(&self, target: &NativeTarget) -> Result<InstalledLocation, SessionError> {
        self.live()?;
        self.holder.session.borrow_mut().set_breakpoint(target)
    }

    pub fn remove_breakpoint(&self, id: &NativeBreakpointId) -> Result<(), SessionError> {
        self.live()?;
        self.holder.session.borrow_mut().remove_breakpoint(id)
    }

    /// Swap the underlying session for a freshly connected one, keeping the
    /// lease. Native breakpoints do not survive; the caller re-installs them.
    pub fn reset(&self) -> Result<(), SessionError> {
        self.live()?;
        let fresh = self.slot.factory.borrow_mut().connect()?;
        let mut session = self.holder.session.borrow_mut();
        session.disconnect();
        *session = fresh;
        Ok(())
    }

    /// Disconnect for good; the next [`SessionSlot::acquire`] connects anew.
    pub fn disconnect(&self) {
        self.holder.revoke();
    }

    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.holder.revoked.get()
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.holder.held.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        connects: Rc<Cell<u32>>,
        disconnects: Rc<Cell<u32>>,
    }

    struct Session {
        disconnects: Rc<Cell<u32>>,
    }

    impl InspectorSession for Session {
        fn set_breakpoint(&mut self, _: &NativeTarget) -> Result<InstalledLocation, SessionError> {
            Ok(InstalledLocation {
                id: NativeBreakpointId("1".into()),
                actual_line: None,
            })
        }

        fn remove_breakpoint(&mut self, _: &NativeBreakpointId) -> Result<(), SessionError> {
            Ok(())
        }

        fn disconnect(&mut self) {
            self.disconnects.set(self.disconnects.get() + 1);
        }
    }

    impl SessionFactory for Counting {
        fn connect(&mut self) -> Result<Box<dyn InspectorSession>, SessionError> {
            self.connects.set(self.connects.get() + 1);
            Ok(Box::new(Session {
                disconnects: Rc::clone(&self.disconnects),
            }))
        }
    }

    fn slot() -> (Rc<SessionSlot>, Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let factory = Counting::default();
        let connects = Rc::clone(&factory.connects);
        let disconnects = Rc::clone(&factory.disconnects);
        (SessionSlot::new(factory), connects, disconnects)
    }

    #[test]
    fn only_one_lease_at_a_time() {
        let (slot, connects, _) = slot();
        let lease = slot.acquire().unwrap();
        assert_eq!(slot.acquire().unwrap_err(), SessionError::Busy);
        drop(lease);
        let _again = slot.acquire().unwrap();
        assert_eq!(connects.get(), 1);
    }

    #[test]
    fn replace_revokes_the_current_lease() {
        let (slot, connects, disconnects) = slot();
        let lease = slot.acquire().unwrap();
        slot.replace().unwrap();
        assert!(lease.is_revoked());
        assert_eq!(disconnects.get(), 1);
        let target = crate::engine::Backend::Legacy.target("/a.js", 1, 1);
        assert_eq!(lease.set_breakpoint(&target).unwrap_err(), SessionError::Disconnected);

        let fresh = slot.acquire().unwrap();
        assert!(fresh.set_breakpoint(&target).is_ok());
        assert_eq!(connects.get(), 2);
    }

    #[test]
    fn reset_keeps_the_lease() {
        let (slot, connects, disconnects) = slot();
        let lease = slot.acquire().unwrap();
        lease.reset().unwrap();
        assert_eq!((connects.get(), disconnects.get()), (2, 1));
        assert!(slot.is_held());
        lease.disconnect();
        assert!(!slot.is_connected());
    }
}
