mod elect_leaders;

pub(crate) use elect_leaders::handle_elect_leaders;
