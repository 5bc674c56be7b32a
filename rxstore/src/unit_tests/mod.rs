use crate::Action;

// Import test modules
mod combinators_test;
mod normalize_test;
mod recovery_test;

#[derive(Clone, Debug, PartialEq)]
pub enum CounterAction {
    Add(i64),
    Fail,
    Reset,
    Other,
}

impl Action for CounterAction {
    fn action_type(&self) -> &str {
        match self {
            CounterAction::Add(_) => "ADD",
            CounterAction::Fail => "FAIL",
            CounterAction::Reset => "RESET",
            CounterAction::Other => "OTHER",
        }
    }
}
