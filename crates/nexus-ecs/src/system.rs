use tracing::error;

use crate::error::EcsError;
use crate::world::Nexus;

/// A unit of per-tick behaviour. Systems receive the context by `&mut` and run
/// sequentially in the order they were scheduled.
pub trait System: Send + Sync {
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError>;

    /// Label used when the system fails.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Closures can be scheduled directly.
impl<F> System for F
where
    F: FnMut(&mut Nexus) -> Result<(), EcsError> + Send + Sync,
{
    fn run(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        (self)(nexus)
    }
}

/// Fixed-order list of systems making up one tick.
pub struct SystemSchedule {
    systems: Vec<Box<dyn System>>,
}

impl SystemSchedule {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Append a system to the end of the tick.
    pub fn add_system<S: System + 'static>(&mut self, system: S) {
        self.systems.push(Box::new(system));
    }

    /// Run every system in order. Stops at the first failing system.
    pub fn run_all(&mut self, nexus: &mut Nexus) -> Result<(), EcsError> {
        for system in &mut self.systems {
            if let Err(e) = system.run(nexus) {
                error!(system = system.name(), "system failed: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl Default for SystemSchedule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn closure_system() {
        let mut nexus = Nexus::new();
        nexus.insert_resource(0u32);

        let mut system = |n: &mut Nexus| -> Result<(), EcsError> {
            if let Some(count) = n.resource_mut::<u32>() {
                *count += 1;
            }
            Ok(())
        };
        system.run(&mut nexus).unwrap();
        assert_eq!(nexus.resource::<u32>(), Some(&1));
    }

    #[test]
    fn schedule_ordering() {
        let mut nexus = Nexus::new();
        let log = Arc::new(Mutex::new(Vec::<u32>::new()));

        let mut schedule = SystemSchedule::new();
        for tag in 1..=3 {
            let log = log.clone();
            schedule.add_system(move |_: &mut Nexus| -> Result<(), EcsError> {
                log.lock().push(tag);
                Ok(())
            });
        }

        schedule.run_all(&mut nexus).unwrap();
        assert_eq!(*log.lock(), vec![1, 2, 3]);
        assert_eq!(schedule.len(), 3);
    }

    #[test]
    fn failing_system_stops_the_tick() {
        let mut nexus = Nexus::new();
        let ran = Arc::new(Mutex::new(false));

        let mut schedule = SystemSchedule::new();
        schedule.add_system(|n: &mut Nexus| {
            let e = n.create();
            n.destroy(e)?;
            n.destroy(e)
        });
        let flag = ran.clone();
        schedule.add_system(move |_: &mut Nexus| -> Result<(), EcsError> {
            *flag.lock() = true;
            Ok(())
        });

        assert!(matches!(
            schedule.run_all(&mut nexus),
            Err(EcsError::EntityNotAlive(_))
        ));
        assert!(!*ran.lock());
    }
}
