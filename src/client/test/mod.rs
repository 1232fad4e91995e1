mod scenario;

mod retry;
