mod notifications;
mod response_order;
mod worker_thread;
