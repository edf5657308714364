use {clap::Subcommand, simargl_tools::ToolRegistry};

use crate::print_json;

#[derive(Subcommand)]
pub enum ToolAction {
    /// List tool names and parameter schemas.
    List,
    /// Invoke a tool with JSON parameters.
    Call {
        name: String,
        /// JSON object of parameters.
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

pub async fn handle_tools(tools: &ToolRegistry, action: ToolAction) -> anyhow::Result<()> {
    match action {
        ToolAction::List => print_json(&tools.list_schemas()),
        ToolAction::Call { name, params } => {
            let params: serde_json::Value = serde_json::from_str(&params)
                .map_err(|e| anyhow::anyhow!("invalid --params JSON: {e}"))?;
            let output = tools.call(&name, params).await?;
            print_json(&output)
        },
    }
}
