use coral_frontend::coral_server_entrypoint;

#[tokio::main]
async fn main() {
    coral_server_entrypoint().await;
}
