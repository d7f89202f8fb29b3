
mod access;
mod mutations;
mod queries;
mod seed;
mod session;
