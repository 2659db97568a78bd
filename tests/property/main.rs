mod interpreter;
mod lifecycle;
