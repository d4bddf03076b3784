// ============================================================================
// Aggregate Root Pattern - Client Domain Core
// ============================================================================
//
// Key Principles:
// 1. Commands are validated against current state before anything changes
// 2. Events describe the change that validation accepted
// 3. State only changes by applying events
// 4. Aggregates enforce their own invariants
//
// Stores never mutate aggregate fields directly; they run a command through
// `execute` on a working copy and publish the copy once it succeeded.
//
// ============================================================================

/// Generic Aggregate trait - resource collections and orders implement this
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized {
    type Event;
    type Command;
    type Error;

    /// Apply an accepted event to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Handle a command and apply every resulting event in order
    ///
    /// Nothing is applied when the command is rejected.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle_command(command)?;

        for event in &events {
            self.apply_event(event)?;
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        value: u32,
    }

    enum CounterCommand {
        Add(u32),
    }

    #[derive(Debug, PartialEq)]
    enum CounterEvent {
        Added(u32),
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Command = CounterCommand;
        type Error = String;

        fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
            match event {
                CounterEvent::Added(n) => self.value += n,
            }
            Ok(())
        }

        fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
            match command {
                CounterCommand::Add(0) => Err("nothing to add".to_string()),
                CounterCommand::Add(n) => Ok(vec![CounterEvent::Added(*n)]),
            }
        }
    }

    #[test]
    fn test_execute_applies_events() {
        let mut counter = Counter::default();
        let events = counter.execute(&CounterCommand::Add(3)).unwrap();

        assert_eq!(events, vec![CounterEvent::Added(3)]);
        assert_eq!(counter.value, 3);
    }

    #[test]
    fn test_rejected_command_leaves_state() {
        let mut counter = Counter { value: 7 };
        assert!(counter.execute(&CounterCommand::Add(0)).is_err());
        assert_eq!(counter.value, 7);
    }
}
