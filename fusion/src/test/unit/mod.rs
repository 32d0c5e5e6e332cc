mod context;
mod loop_synthesis;
