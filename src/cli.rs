// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

use crate::engine::budget::MAX_HISTORY_MONTHS;

fn json_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .help("Print JSON")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .help("Print one JSON object per line")
            .action(ArgAction::SetTrue)
            .conflicts_with("json"),
    )
}

fn month_arg() -> Arg {
    Arg::new("month")
        .long("month")
        .help("Month as YYYY-MM (defaults to the current month)")
}

fn account_filter_arg() -> Arg {
    Arg::new("account")
        .long("account")
        .help("Only count transactions of this account")
}

fn id_arg() -> Arg {
    Arg::new("id")
        .required(true)
        .value_parser(value_parser!(i64))
}

fn bool_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .value_parser(value_parser!(bool))
}

fn config_cmd() -> Command {
    Command::new("config")
        .about("Manage settings (remote.url, remote.token, proposal.payment_method, budget.top_categories)")
        .subcommand_required(true)
        .subcommand(
            Command::new("set")
                .arg(Arg::new("key").required(true))
                .arg(Arg::new("value").required(true)),
        )
        .subcommand(Command::new("get").arg(Arg::new("key").required(true)))
        .subcommand(Command::new("unset").arg(Arg::new("key").required(true)))
        .subcommand(json_args(Command::new("list")))
}

fn category_cmd() -> Command {
    Command::new("category")
        .about("Manage the category list")
        .subcommand_required(true)
        .subcommand(Command::new("add").arg(Arg::new("name").required(true)))
        .subcommand(json_args(Command::new("list")))
        .subcommand(Command::new("rm").arg(Arg::new("name").required(true)))
        .subcommand(
            Command::new("rename")
                .arg(Arg::new("from").required(true))
                .arg(Arg::new("to").required(true)),
        )
}

fn tx_cmd() -> Command {
    Command::new("tx")
        .about("Record and edit transactions")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(Arg::new("date").long("date").required(true))
                .arg(Arg::new("name").long("name").required(true))
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .required(true)
                        .allow_hyphen_values(true)
                        .help("Negative amounts are recorded as Saída"),
                )
                .arg(
                    Arg::new("type")
                        .long("type")
                        .help("Entrada|Saída (overrides the amount's sign)"),
                )
                .arg(Arg::new("account").long("account").required(true))
                .arg(Arg::new("category").long("category"))
                .arg(Arg::new("description").long("description")),
        )
        .subcommand(json_args(
            Command::new("list")
                .arg(month_arg())
                .arg(Arg::new("account").long("account"))
                .arg(Arg::new("category").long("category"))
                .arg(
                    Arg::new("uncategorized")
                        .long("uncategorized")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(value_parser!(usize)),
                ),
        ))
        .subcommand(
            Command::new("edit")
                .about("Change only the given fields")
                .arg(id_arg())
                .arg(Arg::new("date").long("date"))
                .arg(Arg::new("name").long("name"))
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .allow_hyphen_values(true),
                )
                .arg(Arg::new("type").long("type"))
                .arg(Arg::new("account").long("account"))
                .arg(
                    Arg::new("category")
                        .long("category")
                        .help("Empty string clears the category"),
                )
                .arg(Arg::new("description").long("description"))
                .arg(bool_arg("reconciled", "Mark as reconciled (true|false)")),
        )
        .subcommand(Command::new("rm").arg(id_arg()))
        .subcommand(
            Command::new("categorize")
                .about("Set a category on several transactions, replacing what they had")
                .arg(Arg::new("category").long("category").required(true))
                .arg(
                    Arg::new("ids")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(i64)),
                ),
        )
}

fn import_cmd() -> Command {
    Command::new("import")
        .about("Import bank statements")
        .subcommand_required(true)
        .subcommand(json_args(
            Command::new("transactions")
                .about("Import a CSV or OFX statement")
                .arg(Arg::new("path").long("path").required(true))
                .arg(Arg::new("account").long("account").required(true))
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .help("Show the preview without saving")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no_rules")
                        .long("no-rules")
                        .help("Do not categorize imported rows")
                        .action(ArgAction::SetTrue),
                ),
        ))
}

fn rules_cmd() -> Command {
    Command::new("rules")
        .about("Categorization rules")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(
                    Arg::new("pattern")
                        .long("pattern")
                        .required(true)
                        .help("Text looked up in name and description, ignoring case"),
                )
                .arg(Arg::new("category").long("category").required(true))
                .arg(Arg::new("name").long("name"))
                .arg(
                    Arg::new("priority")
                        .long("priority")
                        .allow_hyphen_values(true)
                        .value_parser(value_parser!(i64))
                        .default_value("0"),
                ),
        )
        .subcommand(json_args(Command::new("list")))
        .subcommand(Command::new("rm").arg(id_arg()))
        .subcommand(Command::new("enable").arg(id_arg()))
        .subcommand(Command::new("disable").arg(id_arg()))
        .subcommand(json_args(
            Command::new("apply")
                .about("Categorize uncategorized transactions")
                .arg(month_arg())
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue),
                ),
        ))
        .subcommand(
            Command::new("test")
                .about("Show which rule would match")
                .arg(Arg::new("name").required(true))
                .arg(Arg::new("description").long("description")),
        )
}

fn budget_cmd() -> Command {
    Command::new("budget")
        .about("Monthly budget goals")
        .subcommand_required(true)
        .subcommand(
            Command::new("set")
                .arg(month_arg())
                .arg(Arg::new("category").long("category").required(true))
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .required(true)
                        .allow_hyphen_values(true),
                )
                .arg(Arg::new("name").long("name"))
                .arg(Arg::new("notes").long("notes")),
        )
        .subcommand(json_args(Command::new("list").arg(month_arg())))
        .subcommand(Command::new("rm").arg(id_arg()))
        .subcommand(json_args(
            Command::new("summary")
                .arg(month_arg())
                .arg(account_filter_arg())
                .arg(
                    Arg::new("top")
                        .long("top")
                        .value_parser(value_parser!(usize))
                        .help("Ranked categories to show (budget.top_categories)"),
                ),
        ))
}

fn report_cmd() -> Command {
    Command::new("report")
        .about("Cash-flow reports")
        .subcommand_required(true)
        .subcommand(json_args(
            Command::new("cashflow")
                .arg(month_arg())
                .arg(account_filter_arg()),
        ))
        .subcommand(json_args(Command::new("balances")))
        .subcommand(json_args(
            Command::new("history")
                .arg(month_arg())
                .arg(account_filter_arg())
                .arg(
                    Arg::new("months")
                        .long("months")
                        .value_parser(value_parser!(u32).range(1..=i64::from(MAX_HISTORY_MONTHS)))
                        .default_value("6"),
                ),
        ))
        .subcommand(json_args(
            Command::new("decisions")
                .about("This month against last month and the 3-month average")
                .arg(month_arg())
                .arg(account_filter_arg()),
        ))
}

fn adjustment_cmd(name: &'static str) -> Command {
    Command::new(name)
        .arg(id_arg())
        .arg(
            Arg::new("kind")
                .long("kind")
                .default_value("percent")
                .help("percent|fixed"),
        )
        .arg(
            Arg::new("value")
                .long("value")
                .required(true)
                .allow_hyphen_values(true),
        )
}

fn proposal_cmd() -> Command {
    Command::new("proposal")
        .about("Commercial proposals")
        .subcommand_required(true)
        .subcommand(
            Command::new("new")
                .arg(Arg::new("client").long("client").required(true))
                .arg(Arg::new("company").long("company"))
                .arg(Arg::new("document").long("document"))
                .arg(Arg::new("email").long("email"))
                .arg(Arg::new("phone").long("phone"))
                .arg(Arg::new("city").long("city"))
                .arg(Arg::new("number").long("number"))
                .arg(Arg::new("date").long("date"))
                .arg(Arg::new("valid_until").long("valid-until"))
                .arg(Arg::new("observations").long("observations")),
        )
        .subcommand(
            Command::new("service")
                .about("Add a service line")
                .arg(id_arg())
                .arg(Arg::new("name").long("name").required(true))
                .arg(
                    Arg::new("quantity")
                        .long("quantity")
                        .value_parser(value_parser!(u32))
                        .default_value("1"),
                )
                .arg(Arg::new("unit_value").long("unit-value").required(true))
                .arg(Arg::new("description").long("description"))
                .arg(Arg::new("procedures").long("procedures"))
                .arg(Arg::new("materials").long("materials")),
        )
        .subcommand(
            Command::new("service-rm")
                .about("Remove a service line by its 1-based position")
                .arg(id_arg())
                .arg(
                    Arg::new("line")
                        .long("line")
                        .required(true)
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(adjustment_cmd("discount"))
        .subcommand(adjustment_cmd("tax"))
        .subcommand(
            Command::new("installments")
                .about("Replace the payment schedule with equal monthly installments")
                .arg(id_arg())
                .arg(
                    Arg::new("count")
                        .long("count")
                        .required(true)
                        .allow_hyphen_values(true)
                        .value_parser(value_parser!(i64)),
                )
                .arg(Arg::new("first_due").long("first-due").required(true))
                .arg(Arg::new("method").long("method")),
        )
        .subcommand(
            Command::new("status")
                .arg(id_arg())
                .arg(Arg::new("status").required(true))
                .arg(Arg::new("reason").long("reason")),
        )
        .subcommand(json_args(Command::new("show").arg(id_arg())))
        .subcommand(json_args(Command::new("list")))
        .subcommand(Command::new("rm").arg(id_arg()))
}

fn kpi_cmd() -> Command {
    Command::new("kpi")
        .about("KPI definitions")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(Arg::new("name").long("name").required(true))
                .arg(
                    Arg::new("periodicity")
                        .long("periodicity")
                        .required(true)
                        .help("Mensal|Trimestral|Semestral|Anual"),
                )
                .arg(
                    Arg::new("sort_order")
                        .long("sort-order")
                        .value_parser(value_parser!(i64))
                        .default_value("0"),
                )
                .arg(Arg::new("public").long("public").action(ArgAction::SetTrue))
                .arg(
                    Arg::new("financial")
                        .long("financial")
                        .action(ArgAction::SetTrue),
                )
                .arg(Arg::new("unit").long("unit")),
        )
        .subcommand(
            Command::new("edit")
                .arg(id_arg())
                .arg(Arg::new("name").long("name"))
                .arg(Arg::new("periodicity").long("periodicity"))
                .arg(
                    Arg::new("sort_order")
                        .long("sort-order")
                        .value_parser(value_parser!(i64)),
                )
                .arg(bool_arg("public", "Publicly visible (true|false)"))
                .arg(bool_arg("financial", "Financial KPI (true|false)"))
                .arg(Arg::new("unit").long("unit")),
        )
        .subcommand(json_args(Command::new("list")))
        .subcommand(Command::new("rm").arg(id_arg()))
}

fn goal_cmd() -> Command {
    Command::new("goal")
        .about("KPI goals")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(
                    Arg::new("kpi")
                        .long("kpi")
                        .required(true)
                        .value_parser(value_parser!(i64)),
                )
                .arg(
                    Arg::new("year")
                        .long("year")
                        .required(true)
                        .value_parser(value_parser!(i32)),
                )
                .arg(
                    Arg::new("month")
                        .long("month")
                        .help("1-12; omit for a whole-period goal")
                        .value_parser(value_parser!(u32)),
                )
                .arg(Arg::new("target").long("target").required(true))
                .arg(Arg::new("actual").long("actual").default_value("0"))
                .arg(Arg::new("public").long("public").action(ArgAction::SetTrue)),
        )
        .subcommand(json_args(
            Command::new("list").arg(
                Arg::new("kpi")
                    .long("kpi")
                    .value_parser(value_parser!(i64)),
            ),
        ))
        .subcommand(
            Command::new("actual")
                .about("Record the actual value of a goal")
                .arg(id_arg())
                .arg(Arg::new("value").required(true).allow_hyphen_values(true)),
        )
        .subcommand(Command::new("rm").arg(id_arg()))
}

fn export_cmd() -> Command {
    Command::new("export")
        .about("Export data")
        .subcommand_required(true)
        .subcommand(
            Command::new("transactions")
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("csv")
                        .help("csv|json"),
                )
                .arg(Arg::new("out").long("out").required(true))
                .arg(
                    Arg::new("month")
                        .long("month")
                        .help("Only this month (YYYY-MM)"),
                ),
        )
        .subcommand(
            Command::new("proposal")
                .arg(id_arg())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("txt")
                        .help("txt|json"),
                )
                .arg(Arg::new("out").long("out").required(true)),
        )
}

fn calc_cmd() -> Command {
    Command::new("calc")
        .about("Stand-alone calculators")
        .subcommand_required(true)
        .subcommand(json_args(
            Command::new("installments")
                .arg(Arg::new("total").long("total").required(true))
                .arg(
                    Arg::new("count")
                        .long("count")
                        .required(true)
                        .allow_hyphen_values(true)
                        .value_parser(value_parser!(i64)),
                )
                .arg(Arg::new("first_due").long("first-due").required(true))
                .arg(Arg::new("method").long("method")),
        ))
        .subcommand(
            Command::new("money")
                .about("Parse a typed amount and show every display format")
                .arg(Arg::new("raw").required(true).allow_hyphen_values(true)),
        )
}

pub fn build_cli() -> Command {
    Command::new("opsbook")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Finance, budgeting, proposals and KPIs for a small consultancy")
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(config_cmd())
        .subcommand(category_cmd())
        .subcommand(tx_cmd())
        .subcommand(import_cmd())
        .subcommand(rules_cmd())
        .subcommand(budget_cmd())
        .subcommand(report_cmd())
        .subcommand(proposal_cmd())
        .subcommand(kpi_cmd())
        .subcommand(goal_cmd())
        .subcommand(json_args(
            Command::new("dashboard")
                .about("KPIs grouped by period with their current goals")
                .arg(
                    Arg::new("public")
                        .long("public")
                        .help("Only what the public dashboard shows")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("date")
                        .long("date")
                        .help("Reference date (defaults to today)"),
                ),
        ))
        .subcommand(export_cmd())
        .subcommand(
            Command::new("remote")
                .about("Upstream data service")
                .subcommand_required(true)
                .subcommand(json_args(
                    Command::new("pull").arg(
                        Arg::new("only")
                            .long("only")
                            .value_delimiter(',')
                            .help("transactions,budget-goals,rules,kpis,goals"),
                    ),
                )),
        )
        .subcommand(Command::new("doctor").about("Check stored data for inconsistencies"))
        .subcommand(calc_cmd())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        build_cli().debug_assert();
    }
}
