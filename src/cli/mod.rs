use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{
    AppError, CompanyRevenueReport, CustomerBalancePeriodReport, CustomerBalanceReport,
    CustomersBalanceSummaryReport, LedgerService, LedgerSettings,
};
use crate::domain::{
    CustomerKind, TransactionType, end_of_day, format_amount, generate_account_number,
    parse_amount, parse_positive_amount, primary_address_label,
};
use crate::io::{Exporter, write_json};

/// Fiscus - Customer account ledger
#[derive(Parser)]
#[command(name = "fiscus")]
#[command(about = "Customer accounts, balances, service fees and reports on a local ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "FISCUS_DATABASE", default_value = "fiscus.db")]
    pub database: String,

    /// Credit applied to the first account of a new customer
    #[arg(long, env = "FISCUS_OPENING_DEPOSIT", default_value = "100.00")]
    pub opening_deposit: String,

    /// Bank name for accounts opened during onboarding
    #[arg(long, env = "FISCUS_BANK_NAME", default_value = "Fiscus Bank")]
    pub bank_name: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Address management commands
    #[command(subcommand)]
    Address(AddressCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Credit or debit an account
    Transaction {
        /// Account ID
        account: String,

        /// Transaction type: credit, debit
        #[arg(short = 't', long = "type")]
        kind: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Description of the transaction
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List transactions
    Transactions {
        /// Only transactions of this account
        #[arg(long, conflicts_with = "customer")]
        account: Option<String>,

        /// Only transactions of this customer's accounts
        #[arg(long)]
        customer: Option<String>,
    },

    /// Show the balance of an account, now or at the end of a past day
    Balance {
        /// Account ID
        account: String,

        /// Date (YYYY-MM-DD) to rebuild the balance at
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Generate reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Verify that live balances match the transaction history
    Check,

    /// Export a customer's statement
    Export {
        /// Customer ID
        customer: String,

        /// Format: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Register a customer and open their first account
    Create {
        /// Customer name
        name: String,

        /// Customer type: PF (individual), PJ (corporate)
        #[arg(short = 't', long = "type")]
        customer_type: String,

        /// Individual taxpayer number, required for PF
        #[arg(long)]
        cpf: Option<String>,

        /// Company registration number, required for PJ
        #[arg(long)]
        cnpj: Option<String>,

        /// Contact phone
        #[arg(short, long)]
        phone: String,
    },

    /// List all customers
    List,

    /// Show customer details
    Show {
        /// Customer ID
        id: String,
    },

    /// Change a customer's name or phone
    Update {
        /// Customer ID
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        phone: Option<String>,
    },

    /// Delete a customer without accounts
    Delete {
        /// Customer ID
        id: String,
    },

    /// Sum of the live balances of a customer's accounts
    Balance {
        /// Customer ID
        id: String,
    },

    /// Service fee breakdown by 30-day window
    Fee {
        /// Customer ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AddressCommands {
    /// Add an address to a customer
    Add {
        /// Customer ID
        customer: String,

        #[arg(long)]
        street: String,

        #[arg(long)]
        city: String,

        #[arg(long)]
        state: String,

        #[arg(long)]
        zip: String,
    },

    /// List addresses
    List {
        /// Only addresses of this customer
        #[arg(long)]
        customer: Option<String>,
    },

    /// Show an address
    Show {
        /// Address ID
        id: String,
    },

    /// Change an address
    Update {
        /// Address ID
        id: String,

        #[arg(long)]
        street: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        zip: Option<String>,
    },

    /// Delete an address
    Delete {
        /// Address ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open an account for a customer
    Create {
        /// Customer ID
        customer: String,

        #[arg(long)]
        bank: String,

        #[arg(long)]
        agency: String,

        /// Account number (generated if omitted)
        #[arg(long)]
        number: Option<String>,

        /// Opening balance
        #[arg(long, default_value = "0")]
        opening_balance: String,
    },

    /// List accounts
    List {
        /// Only accounts of this customer
        #[arg(long)]
        customer: Option<String>,
    },

    /// Show account details
    Show {
        /// Account ID
        id: String,
    },

    /// Edit an account that has no transactions yet
    Update {
        /// Account ID
        id: String,

        #[arg(long)]
        bank: Option<String>,

        #[arg(long)]
        agency: Option<String>,

        #[arg(long)]
        number: Option<String>,

        #[arg(long)]
        opening_balance: Option<String>,
    },

    /// Deactivate an account
    Delete {
        /// Account ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Current balance, movements and fee of a customer
    Customer {
        /// Customer ID
        id: String,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Customer balance with movements restricted to a period
    Period {
        /// Customer ID
        id: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Every customer's balance at the end of a day
    Summary {
        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Transaction volume per customer over a period
    Revenue {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    fn settings(&self) -> Result<LedgerSettings> {
        let opening_deposit = parse_positive_amount(&self.opening_deposit)
            .map_err(AppError::from)
            .context("Invalid opening deposit")?;

        Ok(LedgerSettings {
            opening_deposit,
            bank_name: self.bank_name.clone(),
            ..LedgerSettings::default()
        })
    }

    async fn connect(&self) -> Result<LedgerService> {
        let service = LedgerService::connect(&self.database)
            .await
            .with_context(|| format!("Cannot open database '{}'. Run 'fiscus init' first", self.database))?;
        let repo = service.repository().clone();
        Ok(LedgerService::with_settings(repo, self.settings()?))
    }

    pub async fn run(self) -> Result<()> {
        if let Commands::Init = self.command {
            LedgerService::init(&self.database).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let service = self.connect().await?;

        match self.command {
            Commands::Init => {}

            Commands::Customer(cmd) => run_customer_command(&service, cmd).await?,

            Commands::Address(cmd) => run_address_command(&service, cmd).await?,

            Commands::Account(cmd) => run_account_command(&service, cmd).await?,

            Commands::Transaction {
                account,
                kind,
                amount,
                description,
            } => {
                let account_id = parse_id(&account, "account")?;
                let kind = TransactionType::from_str(&kind).ok_or_else(|| {
                    AppError::Validation(format!(
                        "Invalid transaction type '{}'. Use credit or debit",
                        kind
                    ))
                })?;
                let amount = parse_positive_amount(&amount).map_err(AppError::from)?;

                let result = service
                    .apply_transaction(account_id, kind, amount, description)
                    .await?;

                println!(
                    "Recorded {}: {} on account {} ({})",
                    result.transaction.kind,
                    format_amount(result.transaction.amount),
                    result.account.number,
                    result.transaction.id
                );
                println!("New balance: {}", format_amount(result.account.balance));
            }

            Commands::Transactions { account, customer } => {
                let transactions = match (account, customer) {
                    (Some(account), _) => {
                        service
                            .list_transactions_for_account(parse_id(&account, "account")?)
                            .await?
                    }
                    (None, Some(customer)) => {
                        service
                            .list_transactions_for_customer(parse_id(&customer, "customer")?)
                            .await?
                    }
                    (None, None) => service.list_transactions().await?,
                };

                if transactions.is_empty() {
                    println!("No transactions found.");
                } else {
                    println!(
                        "{:<20} {:<8} {:>14}  {:<36}  {}",
                        "DATE", "TYPE", "AMOUNT", "ACCOUNT", "DESCRIPTION"
                    );
                    println!("{}", "-".repeat(100));
                    for t in &transactions {
                        println!(
                            "{:<20} {:<8} {:>14}  {:<36}  {}",
                            t.date.format("%Y-%m-%d %H:%M:%S"),
                            t.kind,
                            format_amount(t.amount),
                            t.account_id,
                            t.description.as_deref().unwrap_or("")
                        );
                    }
                }
            }

            Commands::Balance { account, as_of } => {
                let account_id = parse_id(&account, "account")?;
                match as_of {
                    Some(date) => {
                        let date = parse_date(&date)?;
                        let balance = service.balance_as_of(account_id, end_of_day(date)).await?;
                        println!("Balance at end of {}: {}", date, format_amount(balance));
                    }
                    None => {
                        let account = service.get_account(account_id).await?;
                        println!("Balance: {}", format_amount(account.balance));
                    }
                }
            }

            Commands::Report(cmd) => run_report_command(&service, cmd).await?,

            Commands::Check => run_check_command(&service).await?,

            Commands::Export {
                customer,
                format,
                output,
            } => run_export_command(&service, &customer, &format, output).await?,
        }

        Ok(())
    }
}

async fn run_customer_command(service: &LedgerService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Create {
            name,
            customer_type,
            cpf,
            cnpj,
            phone,
        } => {
            let kind = CustomerKind::from_parts(&customer_type, cpf.as_deref(), cnpj.as_deref())
                .map_err(AppError::from)?;
            let result = service.create_customer(&name, kind, &phone).await?;

            println!(
                "Created customer: {} ({})",
                result.customer.name, result.customer.id
            );
            println!(
                "Opened account {} / {} / {} ({})",
                result.account.bank, result.account.agency, result.account.number, result.account.id
            );
            println!(
                "Opening deposit: {}",
                format_amount(result.opening_transaction.amount)
            );
        }

        CustomerCommands::List => {
            let customers = service.list_customers().await?;
            if customers.is_empty() {
                println!("No customers found.");
            } else {
                println!(
                    "{:<36}  {:<24} {:<4} {:<20} {:<10}",
                    "ID", "NAME", "TYPE", "DOCUMENT", "SINCE"
                );
                println!("{}", "-".repeat(100));
                for c in &customers {
                    println!(
                        "{:<36}  {:<24} {:<4} {:<20} {:<10}",
                        c.id,
                        c.name,
                        c.kind.code(),
                        c.kind.document(),
                        c.since_label()
                    );
                }
            }
        }

        CustomerCommands::Show { id } => {
            let customer = service.get_customer(parse_id(&id, "customer")?).await?;
            let addresses = service.list_addresses(Some(customer.id)).await?;
            let accounts = service.list_accounts(Some(customer.id)).await?;

            println!("Customer: {}", customer.name);
            println!("  ID:        {}", customer.id);
            println!("  Type:      {}", customer.kind.code());
            println!("  Document:  {}", customer.kind.document());
            println!("  Phone:     {}", customer.phone);
            println!("  Since:     {}", customer.since_label());
            println!("  Address:   {}", primary_address_label(&addresses));
            println!("  Accounts:  {}", accounts.len());
        }

        CustomerCommands::Update { id, name, phone } => {
            let current = service.get_customer(parse_id(&id, "customer")?).await?;
            let name = name.unwrap_or(current.name);
            let phone = phone.unwrap_or(current.phone);

            let customer = service.update_customer(current.id, &name, &phone).await?;
            println!("Updated customer: {} ({})", customer.name, customer.id);
        }

        CustomerCommands::Delete { id } => {
            let customer = service.delete_customer(parse_id(&id, "customer")?).await?;
            println!("Deleted customer: {}", customer.name);
        }

        CustomerCommands::Balance { id } => {
            let balance = service.customer_balance(parse_id(&id, "customer")?).await?;
            println!("Balance: {}", format_amount(balance));
        }

        CustomerCommands::Fee { id } => {
            let windows = service.fee_breakdown(parse_id(&id, "customer")?).await?;
            if windows.is_empty() {
                println!("No fee windows yet.");
                return Ok(());
            }

            println!(
                "{:<12} {:<12} {:>8} {:>10} {:>10}",
                "FROM", "TO", "COUNT", "RATE", "FEE"
            );
            println!("{}", "-".repeat(56));
            for w in &windows {
                println!(
                    "{:<12} {:<12} {:>8} {:>10} {:>10}",
                    w.start,
                    w.end,
                    w.transaction_count,
                    format_amount(w.fee_per_transaction),
                    format_amount(w.fee())
                );
            }
            let total = windows.iter().map(|w| w.fee()).sum();
            println!("{}", "-".repeat(56));
            println!("{:<45} {:>10}", "TOTAL", format_amount(total));
        }
    }

    Ok(())
}

async fn run_address_command(service: &LedgerService, cmd: AddressCommands) -> Result<()> {
    match cmd {
        AddressCommands::Add {
            customer,
            street,
            city,
            state,
            zip,
        } => {
            let customer_id = parse_id(&customer, "customer")?;
            let address = service
                .add_address(customer_id, &street, &city, &state, &zip)
                .await?;
            println!("Added address: {} ({})", address.one_line(), address.id);
        }

        AddressCommands::List { customer } => {
            let customer_id = customer.map(|c| parse_id(&c, "customer")).transpose()?;
            let addresses = service.list_addresses(customer_id).await?;
            if addresses.is_empty() {
                println!("No addresses found.");
            } else {
                println!("{:<36}  {:<36}  {}", "ID", "CUSTOMER", "ADDRESS");
                println!("{}", "-".repeat(100));
                for a in &addresses {
                    println!("{:<36}  {:<36}  {}", a.id, a.customer_id, a.one_line());
                }
            }
        }

        AddressCommands::Show { id } => {
            let address = service.get_address(parse_id(&id, "address")?).await?;
            println!("Address: {}", address.id);
            println!("  Customer:  {}", address.customer_id);
            println!("  Street:    {}", address.street);
            println!("  City:      {}", address.city);
            println!("  State:     {}", address.state);
            println!("  Zip code:  {}", address.zip_code);
        }

        AddressCommands::Update {
            id,
            street,
            city,
            state,
            zip,
        } => {
            let current = service.get_address(parse_id(&id, "address")?).await?;
            let address = service
                .update_address(
                    current.id,
                    street.as_deref().unwrap_or(&current.street),
                    city.as_deref().unwrap_or(&current.city),
                    state.as_deref().unwrap_or(&current.state),
                    zip.as_deref().unwrap_or(&current.zip_code),
                )
                .await?;
            println!("Updated address: {}", address.one_line());
        }

        AddressCommands::Delete { id } => {
            let address = service.delete_address(parse_id(&id, "address")?).await?;
            println!("Deleted address: {}", address.one_line());
        }
    }

    Ok(())
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            customer,
            bank,
            agency,
            number,
            opening_balance,
        } => {
            let customer_id = parse_id(&customer, "customer")?;
            let opening_balance = parse_amount(&opening_balance).map_err(AppError::from)?;
            let number = number.unwrap_or_else(generate_account_number);

            let account = service
                .create_account(customer_id, &bank, &agency, &number, opening_balance)
                .await?;
            println!(
                "Opened account {} / {} / {} ({})",
                account.bank, account.agency, account.number, account.id
            );
        }

        AccountCommands::List { customer } => {
            let customer_id = customer.map(|c| parse_id(&c, "customer")).transpose()?;
            let accounts = service.list_accounts(customer_id).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<36}  {:<16} {:<6} {:<12} {:>14} {:<8}",
                    "ID", "BANK", "AGENCY", "NUMBER", "BALANCE", "STATUS"
                );
                println!("{}", "-".repeat(100));
                for a in &accounts {
                    println!(
                        "{:<36}  {:<16} {:<6} {:<12} {:>14} {:<8}",
                        a.id,
                        a.bank,
                        a.agency,
                        a.number,
                        format_amount(a.balance),
                        a.status
                    );
                }
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(parse_id(&id, "account")?).await?;
            println!("Account: {}", account.number);
            println!("  ID:               {}", account.id);
            println!("  Customer:         {}", account.customer_id);
            println!("  Bank:             {}", account.bank);
            println!("  Agency:           {}", account.agency);
            println!("  Status:           {}", account.status);
            println!(
                "  Initial balance:  {}",
                format_amount(account.initial_balance)
            );
            println!("  Balance:          {}", format_amount(account.balance));
        }

        AccountCommands::Update {
            id,
            bank,
            agency,
            number,
            opening_balance,
        } => {
            let current = service.get_account(parse_id(&id, "account")?).await?;
            let opening_balance = match opening_balance {
                Some(value) => parse_amount(&value).map_err(AppError::from)?,
                None => current.initial_balance,
            };

            let account = service
                .update_account(
                    current.id,
                    bank.as_deref().unwrap_or(&current.bank),
                    agency.as_deref().unwrap_or(&current.agency),
                    number.as_deref().unwrap_or(&current.number),
                    opening_balance,
                )
                .await?;
            println!("Updated account: {} ({})", account.number, account.id);
        }

        AccountCommands::Delete { id } => {
            let account = service.delete_account(parse_id(&id, "account")?).await?;
            println!("Deactivated account: {} ({})", account.number, account.id);
        }
    }

    Ok(())
}

async fn run_report_command(service: &LedgerService, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Customer { id, format } => {
            let report = service
                .customer_balance_report(parse_id(&id, "customer")?)
                .await?;
            match format.as_str() {
                "json" => write_json(&report, std::io::stdout())?,
                "csv" => print_customer_report_csv(&report),
                _ => print_customer_report(&report),
            }
        }

        ReportCommands::Period {
            id,
            from,
            to,
            format,
        } => {
            let report = service
                .customer_balance_period_report(
                    parse_id(&id, "customer")?,
                    parse_date(&from)?,
                    parse_date(&to)?,
                )
                .await?;
            match format.as_str() {
                "json" => write_json(&report, std::io::stdout())?,
                "csv" => print_period_report_csv(&report),
                _ => print_period_report(&report),
            }
        }

        ReportCommands::Summary { date, format } => {
            let date = date.map(|d| parse_date(&d)).transpose()?;
            let report = service.balance_summary_report(date).await?;
            match format.as_str() {
                "json" => write_json(&report, std::io::stdout())?,
                "csv" => {
                    println!("customer,since,balance");
                    for c in &report.customers {
                        println!(
                            "{},{},{}",
                            c.customer_name,
                            c.customer_since,
                            format_amount(c.balance)
                        );
                    }
                }
                _ => print_summary_report(&report),
            }
        }

        ReportCommands::Revenue { from, to, format } => {
            let report = service
                .company_revenue_report(parse_date(&from)?, parse_date(&to)?)
                .await?;
            match format.as_str() {
                "json" => write_json(&report, std::io::stdout())?,
                "csv" => {
                    println!("customer,transactions,amount");
                    for c in &report.customers {
                        println!(
                            "{},{},{}",
                            c.customer_name,
                            c.transaction_count,
                            format_amount(c.total_amount)
                        );
                    }
                    println!("TOTAL,,{}", format_amount(report.total_revenue));
                }
                _ => print_revenue_report(&report),
            }
        }
    }

    Ok(())
}

fn print_customer_report(report: &CustomerBalanceReport) {
    println!("Customer Balance Report");
    println!();
    println!("Customer:         {}", report.customer_name);
    println!("Customer since:   {}", report.customer_since);
    println!("Address:          {}", report.address);
    println!("Credits:          {}", report.credit_movements);
    println!("Debits:           {}", report.debit_movements);
    println!("Total movements:  {}", report.total_movements);
    println!("Fee paid:         {}", format_amount(report.fee_paid));
    println!("Initial balance:  {}", format_amount(report.initial_balance));
    println!("Current balance:  {}", format_amount(report.current_balance));
}

fn print_customer_report_csv(report: &CustomerBalanceReport) {
    println!("customer,since,address,credits,debits,total,fee,initial_balance,current_balance");
    println!(
        "{},{},\"{}\",{},{},{},{},{},{}",
        report.customer_name,
        report.customer_since,
        report.address,
        report.credit_movements,
        report.debit_movements,
        report.total_movements,
        format_amount(report.fee_paid),
        format_amount(report.initial_balance),
        format_amount(report.current_balance)
    );
}

fn print_period_report(report: &CustomerBalancePeriodReport) {
    println!("Customer Balance Report");
    println!("Period: {}", report.period);
    println!();
    println!("Customer:         {}", report.customer_name);
    println!("Customer since:   {}", report.customer_since);
    println!("Address:          {}", report.address);
    println!("Credits:          {}", report.credit_movements);
    println!("Debits:           {}", report.debit_movements);
    println!("Total movements:  {}", report.total_movements);
    println!("Fee paid:         {}", format_amount(report.fee_paid));
    println!("Initial balance:  {}", format_amount(report.initial_balance));
    println!("Current balance:  {}", format_amount(report.current_balance));
}

fn print_period_report_csv(report: &CustomerBalancePeriodReport) {
    println!(
        "period,customer,since,address,credits,debits,total,fee,initial_balance,current_balance"
    );
    println!(
        "{},{},{},\"{}\",{},{},{},{},{},{}",
        report.period,
        report.customer_name,
        report.customer_since,
        report.address,
        report.credit_movements,
        report.debit_movements,
        report.total_movements,
        format_amount(report.fee_paid),
        format_amount(report.initial_balance),
        format_amount(report.current_balance)
    );
}

fn print_summary_report(report: &CustomersBalanceSummaryReport) {
    println!("Customer Balances on {}", report.report_date);
    println!();
    println!("{:<30} {:<12} {:>14}", "CUSTOMER", "SINCE", "BALANCE");
    println!("{}", "-".repeat(58));
    for c in &report.customers {
        println!(
            "{:<30} {:<12} {:>14}",
            c.customer_name,
            c.customer_since,
            format_amount(c.balance)
        );
    }
}

fn print_revenue_report(report: &CompanyRevenueReport) {
    println!("Revenue Report");
    println!("Period: {} to {}", report.start_date, report.end_date);
    println!();
    println!("{:<30} {:>12} {:>14}", "CUSTOMER", "COUNT", "AMOUNT");
    println!("{}", "-".repeat(58));
    for c in &report.customers {
        println!(
            "{:<30} {:>12} {:>14}",
            c.customer_name,
            c.transaction_count,
            format_amount(c.total_amount)
        );
    }
    println!("{}", "-".repeat(58));
    println!(
        "{:<30} {:>12} {:>14}",
        "TOTAL",
        "",
        format_amount(report.total_revenue)
    );
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:     {}", report.account_count);
    println!("Transactions: {}", report.transaction_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
        return Ok(());
    }

    println!("Issues found:");
    if report.invalid_amounts > 0 {
        println!(
            "  - {} transactions with a non-positive amount",
            report.invalid_amounts
        );
    }
    if report.orphan_transactions > 0 {
        println!(
            "  - {} transactions reference a missing account",
            report.orphan_transactions
        );
    }
    for account_id in &report.negative_balances {
        println!("  - Account {} has a negative balance", account_id);
    }
    for m in &report.mismatches {
        println!(
            "  - Account {}: live balance {} but history gives {}",
            m.account_id,
            format_amount(m.live_balance),
            format_amount(m.replayed_balance)
        );
    }
    for account_id in &report.unreplayable {
        println!(
            "  - Account {}: history runs out of the decimal range",
            account_id
        );
    }
    anyhow::bail!("Ledger integrity check failed");
}

async fn run_export_command(
    service: &LedgerService,
    customer: &str,
    format: &str,
    output: Option<String>,
) -> Result<()> {
    let customer_id = parse_id(customer, "customer")?;
    let exporter = Exporter::new(service);

    let writer: Box<dyn std::io::Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    match format {
        "csv" => {
            let count = exporter.export_statement_csv(customer_id, writer).await?;
            eprintln!("Exported {} transactions", count);
        }
        "json" => {
            let statement = exporter.export_statement_json(customer_id, writer).await?;
            eprintln!(
                "Exported {} accounts and {} transactions",
                statement.accounts.len(),
                statement.transactions.len()
            );
        }
        other => {
            return Err(AppError::Validation(format!(
                "Unknown export format '{}'. Use csv or json",
                other
            ))
            .into());
        }
    }

    Ok(())
}

fn parse_id(value: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value)
        .map_err(|_| AppError::Validation(format!("Invalid {} ID '{}' (expected UUID)", what, value)))
}

fn parse_date(date_str: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!(
            "Invalid date format '{}'. Use YYYY-MM-DD",
            date_str
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(matches!(
            parse_date("29/02/2024"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "customer").unwrap(), id);
        assert!(parse_id("not-a-uuid", "customer").is_err());
    }

    #[test]
    fn test_cli_parses_transaction() {
        let cli = Cli::try_parse_from([
            "fiscus",
            "transaction",
            "3f1c3f9e-8d0f-4a43-9a59-0b5d6a1c2f10",
            "--type",
            "debit",
            "12.50",
            "-d",
            "rent",
        ])
        .unwrap();

        match cli.command {
            Commands::Transaction {
                kind,
                amount,
                description,
                ..
            } => {
                assert_eq!(kind, "debit");
                assert_eq!(amount, "12.50");
                assert_eq!(description.as_deref(), Some("rent"));
            }
            _ => panic!("expected transaction command"),
        }
    }

    #[test]
    fn test_settings_from_flags() {
        let cli = Cli::try_parse_from([
            "fiscus",
            "--opening-deposit",
            "250",
            "--bank-name",
            "Test Bank",
            "check",
        ])
        .unwrap();

        let settings = cli.settings().unwrap();
        assert_eq!(settings.opening_deposit, rust_decimal::Decimal::new(250, 0));
        assert_eq!(settings.bank_name, "Test Bank");
        assert_eq!(settings.agency, "0001");
    }

    #[test]
    fn test_settings_reject_non_positive_opening_deposit() {
        for deposit in ["0", "0.00"] {
            let cli = Cli::try_parse_from(["fiscus", "--opening-deposit", deposit, "check"]).unwrap();

            let err = cli.settings().err().unwrap();
            let app_err = err.downcast_ref::<AppError>().unwrap();
            assert!(matches!(app_err, AppError::Validation(_)));
        }
    }
}
