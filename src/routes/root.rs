pub async fn root() -> &'static str {
    "Jira relay is running and integrated with Jira + Keeper!"
}
