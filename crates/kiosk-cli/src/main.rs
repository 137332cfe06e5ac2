use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kiosk_core::report::{self, DaySummary};
use kiosk_core::{AttendanceRecord, Employee};
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[zbus::proxy(
    interface = "org.iconsecurity.Kiosk1",
    default_service = "org.iconsecurity.Kiosk1",
    default_path = "/org/iconsecurity/Kiosk1"
)]
trait Kiosk {
    async fn admin_login(&self, password: &str) -> zbus::Result<bool>;
    async fn register(
        &self,
        password: &str,
        name: &str,
        pin: &str,
        company_number: &str,
    ) -> zbus::Result<String>;
    async fn edit_employee(
        &self,
        password: &str,
        index: u32,
        pin: &str,
        company_number: &str,
    ) -> zbus::Result<String>;
    async fn delete_employee(&self, password: &str, index: u32) -> zbus::Result<String>;
    async fn clear_all_data(&self, password: &str) -> zbus::Result<()>;
    async fn list_employees(&self, password: &str) -> zbus::Result<String>;
    async fn list_records(&self, password: &str) -> zbus::Result<String>;
    async fn monthly_summary(&self, password: &str, month: &str) -> zbus::Result<String>;
    async fn export_csv(&self, password: &str) -> zbus::Result<String>;
    async fn export_pdf(&self, password: &str) -> zbus::Result<Vec<u8>>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser, Debug)]
#[command(name = "kiosk", about = "Attendance kiosk admin CLI")]
struct Cli {
    /// Admin password
    #[arg(long, env = "KIOSK_ADMIN_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Talk to a daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show daemon status
    Status,
    /// Check the admin password
    Login,
    /// Register a new employee; they should be looking into the camera
    Register {
        name: String,
        /// 4-digit PIN
        pin: String,
        company_number: String,
    },
    /// List registered employees
    Employees,
    /// Change an employee's PIN and/or company number
    Edit {
        /// Row number as shown by `kiosk employees`
        index: u32,
        #[arg(long)]
        pin: Option<String>,
        #[arg(long)]
        company_number: Option<String>,
    },
    /// Delete an employee and their face signature
    Delete {
        index: u32,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// List attendance records
    Records,
    /// Days worked per employee
    Summary {
        /// Only count this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
    },
    /// Write attendance records as CSV
    ExportCsv {
        #[arg(short, long, default_value = report::CSV_FILE_NAME)]
        output: PathBuf,
    },
    /// Write attendance records as PDF
    ExportPdf {
        #[arg(short, long, default_value = report::PDF_FILE_NAME)]
        output: PathBuf,
    },
    /// Remove all employees, signatures, and records
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = if cli.system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("failed to connect to D-Bus")?;
    let proxy = KioskProxy::new(&conn).await?;
    tracing::debug!(system = cli.system, "connected to kioskd");

    match cli.command {
        Commands::Status => {
            let status: serde_json::Value = serde_json::from_str(&proxy.status().await?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Login => {
            if proxy.admin_login(password(&cli.password)?).await? {
                println!("Password accepted");
            } else {
                bail!("incorrect admin password");
            }
        }
        Commands::Register {
            name,
            pin,
            company_number,
        } => {
            let password = password(&cli.password)?;
            println!("Looking into the camera...");
            let msg = proxy.register(password, &name, &pin, &company_number).await?;
            println!("{msg}");
        }
        Commands::Employees => {
            let employees: Vec<Employee> =
                serde_json::from_str(&proxy.list_employees(password(&cli.password)?).await?)?;
            print!("{}", report::render_employee_table(&employees));
        }
        Commands::Edit {
            index,
            pin,
            company_number,
        } => {
            if pin.is_none() && company_number.is_none() {
                bail!("nothing to change; pass --pin and/or --company-number");
            }
            let json = proxy
                .edit_employee(
                    password(&cli.password)?,
                    index,
                    pin.as_deref().unwrap_or(""),
                    company_number.as_deref().unwrap_or(""),
                )
                .await?;
            let employee: Employee = serde_json::from_str(&json)?;
            println!(
                "Updated {}: PIN {}, company number {}",
                employee.name, employee.pin, employee.company_number
            );
        }
        Commands::Delete { index, yes } => {
            let password = password(&cli.password)?;
            let employees: Vec<Employee> =
                serde_json::from_str(&proxy.list_employees(password).await?)?;
            let Some(employee) = employees.get(index as usize) else {
                bail!("no employee at position {index}");
            };
            if !yes && !confirm(&format!("Delete {}?", employee.name))? {
                println!("Cancelled");
                return Ok(());
            }
            let name = proxy.delete_employee(password, index).await?;
            println!("Deleted {name}");
        }
        Commands::Records => {
            let records: Vec<AttendanceRecord> =
                serde_json::from_str(&proxy.list_records(password(&cli.password)?).await?)?;
            print!("{}", report::render_record_table(&records));
        }
        Commands::Summary { month } => {
            let json = proxy
                .monthly_summary(password(&cli.password)?, month.as_deref().unwrap_or(""))
                .await?;
            let summary: Vec<DaySummary> = serde_json::from_str(&json)?;
            print!("{}", report::render_summary(&summary));
        }
        Commands::ExportCsv { output } => {
            let csv = proxy.export_csv(password(&cli.password)?).await?;
            std::fs::write(&output, csv)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Wrote {}", output.display());
        }
        Commands::ExportPdf { output } => {
            let pdf = proxy.export_pdf(password(&cli.password)?).await?;
            std::fs::write(&output, pdf)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Wrote {}", output.display());
        }
        Commands::Clear { yes } => {
            let password = password(&cli.password)?;
            if !yes && !confirm("Clear ALL employees, face data, and attendance records?")? {
                println!("Cancelled");
                return Ok(());
            }
            proxy.clear_all_data(password).await?;
            println!("All data cleared");
        }
    }

    Ok(())
}

fn password(password: &Option<String>) -> Result<&str> {
    password
        .as_deref()
        .context("admin password required: pass --password or set KIOSK_ADMIN_PASSWORD")
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_register() {
        let cli = Cli::try_parse_from(["kiosk", "--password", "pw", "register", "Alice", "1234", "C1"]).unwrap();
        assert_eq!(cli.password.as_deref(), Some("pw"));
        assert!(!cli.system);
        assert!(matches!(
            cli.command,
            Commands::Register { ref name, ref pin, ref company_number }
                if name == "Alice" && pin == "1234" && company_number == "C1"
        ));
    }

    #[test]
    fn test_parse_edit_flags() {
        let cli = Cli::try_parse_from(["kiosk", "edit", "2", "--pin", "9999"]).unwrap();
        match cli.command {
            Commands::Edit { index, pin, company_number } => {
                assert_eq!(index, 2);
                assert_eq!(pin.as_deref(), Some("9999"));
                assert_eq!(company_number, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_export_default_file_names() {
        let cli = Cli::try_parse_from(["kiosk", "export-csv"]).unwrap();
        assert!(matches!(cli.command, Commands::ExportCsv { ref output } if output == &PathBuf::from("attendance.csv")));
        let cli = Cli::try_parse_from(["kiosk", "--system", "export-pdf", "-o", "march.pdf"]).unwrap();
        assert!(cli.system);
        assert!(matches!(cli.command, Commands::ExportPdf { ref output } if output == &PathBuf::from("march.pdf")));
    }

    #[test]
    fn test_delete_requires_index() {
        assert!(Cli::try_parse_from(["kiosk", "delete"]).is_err());
        let cli = Cli::try_parse_from(["kiosk", "delete", "0", "--yes"]).unwrap();
        assert!(matches!(cli.command, Commands::Delete { index: 0, yes: true }));
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_password_required() {
        assert!(password(&None).is_err());
        assert_eq!(password(&Some("pw".into())).unwrap(), "pw");
    }
}
