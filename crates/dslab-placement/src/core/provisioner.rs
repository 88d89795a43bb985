//! Provisioners of a single host resource (RAM or network bandwidth).

use std::collections::BTreeMap;

use dyn_clone::{clone_trait_object, DynClone};

/// Allocation policy for one resource kind of a host.
///
/// Allocations are keyed by the VM's unique identifier (see
/// [`VirtualMachine::uid`](crate::core::vm::VirtualMachine::uid)).
pub trait ResourceProvisioner: DynClone {
    /// Returns the total resource capacity.
    fn capacity(&self) -> u64;

    /// Returns the amount currently allocated to VMs.
    fn used(&self) -> u64;

    /// Returns the amount which can still be allocated.
    fn available(&self) -> u64 {
        self.capacity() - self.used()
    }

    /// Returns the amount allocated to the specified VM (zero if none).
    fn allocated_for(&self, vm_uid: &str) -> u64;

    /// Checks whether `amount` can be allocated to the VM without changing any state.
    fn is_suitable(&self, vm_uid: &str, amount: u64) -> bool;

    /// Allocates `amount` to the VM, replacing its previous allocation. Returns false if there is not enough resource.
    fn allocate(&mut self, vm_uid: &str, amount: u64) -> bool;

    /// Releases the allocation of the VM.
    fn deallocate(&mut self, vm_uid: &str);

    /// Releases all allocations.
    fn deallocate_all(&mut self);
}

clone_trait_object!(ResourceProvisioner);

/// Provisioner which grants any request fitting into the remaining capacity.
#[derive(Clone, Debug)]
pub struct SimpleProvisioner {
    capacity: u64,
    available: u64,
    allocations: BTreeMap<String, u64>,
}

impl SimpleProvisioner {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            available: capacity,
            allocations: BTreeMap::new(),
        }
    }
}

impl ResourceProvisioner for SimpleProvisioner {
    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn used(&self) -> u64 {
        self.capacity - self.available
    }

    fn available(&self) -> u64 {
        self.available
    }

    fn allocated_for(&self, vm_uid: &str) -> u64 {
        self.allocations.get(vm_uid).copied().unwrap_or(0)
    }

    fn is_suitable(&self, vm_uid: &str, amount: u64) -> bool {
        self.available + self.allocated_for(vm_uid) >= amount
    }

    fn allocate(&mut self, vm_uid: &str, amount: u64) -> bool {
        if !self.is_suitable(vm_uid, amount) {
            return false;
        }
        self.deallocate(vm_uid);
        self.available -= amount;
        self.allocations.insert(vm_uid.to_string(), amount);
        true
    }

    fn deallocate(&mut self, vm_uid: &str) {
        if let Some(amount) = self.allocations.remove(vm_uid) {
            self.available += amount;
        }
    }

    fn deallocate_all(&mut self) {
        self.allocations.clear();
        self.available = self.capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_replaces_previous_allocation() {
        let mut ram = SimpleProvisioner::new(2048);
        assert!(ram.allocate("0-1", 512));
        assert!(ram.allocate("0-1", 1024));
        assert_eq!(ram.used(), 1024);
        assert_eq!(ram.allocated_for("0-1"), 1024);
        // the current allocation of a VM counts as available for its own resize
        assert!(ram.is_suitable("0-1", 2048));
        assert!(!ram.is_suitable("0-2", 2048));
    }

    #[test]
    fn test_failed_allocation_keeps_state() {
        let mut bw = SimpleProvisioner::new(1000);
        assert!(bw.allocate("0-1", 600));
        assert!(!bw.allocate("0-2", 600));
        assert_eq!(bw.used(), 600);
        assert_eq!(bw.allocated_for("0-2"), 0);
        bw.deallocate("0-2");
        assert_eq!(bw.available(), 400);
        bw.deallocate_all();
        assert_eq!(bw.available(), 1000);
    }
}
