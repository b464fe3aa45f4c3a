pub mod fixtures;

#[cfg(test)]
mod router_tests;
#[cfg(test)]
mod sessions_tests;
#[cfg(test)]
mod signaling_tests;
