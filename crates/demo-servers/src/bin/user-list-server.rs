use demo_servers::user_list::{self, UserList};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    demo_servers::serve("User list server", user_list::router(UserList::new())).await
}
