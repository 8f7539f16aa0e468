mod report;
mod run;
mod runner;
#[cfg(test)]
mod tests;

pub use self::run::run;
