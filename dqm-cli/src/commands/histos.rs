//! Histos command - browse lumisection 2D histograms
//!
//! Filters take the same lookup names as the web application:
//!
//! ```bash
//! dqmctl histos list -f lumisection__run__run_number__in=297057,297100 \
//!     -f entries__gte=1000 --title PixelPhase1/chargeInner_PXLayer_1
//! dqmctl histos titles --json | jq -r '.[]'
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use dqm_etl::db::{HistoRepo, Pagination};
use dqm_etl::filters::LOOKUPS;
use dqm_etl::LumisectionHistos2DFilter;

use super::{print_json, Context, OutputFormat};

#[derive(Parser, Debug)]
pub struct HistosArgs {
    #[command(subcommand)]
    pub command: HistosCommand,
}

#[derive(Subcommand, Debug)]
pub enum HistosCommand {
    /// List histograms matching the filters, ordered by run, lumisection and title
    List(ListArgs),
    /// List every distinct histogram title
    Titles {
        /// Output format
        #[arg(long, short, value_enum, default_value = "human")]
        output: OutputFormat,

        /// Shorthand for --output json
        #[arg(long, conflicts_with = "output")]
        json: bool,
    },
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Filter as LOOKUP=VALUE, e.g. lumisection__ls_number__gte=10 (repeatable)
    #[arg(long = "filter", short = 'f', value_name = "LOOKUP=VALUE")]
    pub filters: Vec<String>,

    /// Only these titles (repeatable)
    #[arg(long)]
    pub title: Vec<String>,

    /// Page number, starting at 1
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Histograms per page (default: browse.page_size from config, max 1000)
    #[arg(long)]
    pub per_page: Option<u32>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Shorthand for --output json
    #[arg(long, conflicts_with = "output")]
    pub json: bool,
}

impl ListArgs {
    fn filter(&self) -> Result<LumisectionHistos2DFilter> {
        let mut filter = LumisectionHistos2DFilter::default();
        for title in &self.title {
            filter.apply("title", title)?;
        }
        for raw in &self.filters {
            let (lookup, value) = raw.split_once('=').ok_or_else(|| {
                anyhow!(
                    "filter '{}' is not LOOKUP=VALUE (lookups: {})",
                    raw,
                    LOOKUPS.join(", ")
                )
            })?;
            filter.apply(lookup.trim(), value)?;
        }
        Ok(filter)
    }
}

pub async fn run_histos(args: HistosArgs, ctx: &Context) -> Result<()> {
    match args.command {
        HistosCommand::List(list) => run_list(list, ctx).await,
        HistosCommand::Titles { output, json } => {
            let pool = ctx.pool().await?;
            let titles = HistoRepo::new(&pool).titles().await?;
            match output.resolve(json) {
                OutputFormat::Json => print_json(&titles)?,
                OutputFormat::Human => titles.iter().for_each(|t| println!("{}", t)),
            }
            Ok(())
        }
    }
}

async fn run_list(args: ListArgs, ctx: &Context) -> Result<()> {
    // Bad filters fail before connecting
    let filter = args.filter()?;
    let page = Pagination::new(
        args.page,
        args.per_page.unwrap_or(ctx.config.browse.page_size),
    );

    let pool = ctx.pool().await?;
    let result = HistoRepo::new(&pool).list(&filter, page).await?;

    if args.output.resolve(args.json) == OutputFormat::Json {
        return print_json(&result);
    }

    if result.items.is_empty() {
        if result.total > 0 {
            println!(
                "No histograms on page {} (last page is {}, {} histograms)",
                result.page,
                result.total_pages(),
                result.total
            );
        } else {
            println!("No histograms match");
        }
        return Ok(());
    }
    println!("{:>8} {:>6} {:>10}  TITLE", "RUN", "LS", "ENTRIES");
    for h in &result.items {
        println!(
            "{:>8} {:>6} {:>10}  {}",
            h.run_number, h.ls_number, h.entries, h.title
        );
    }
    println!(
        "page {}/{} ({} histograms)",
        result.page,
        result.total_pages(),
        result.total
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(filters: &[&str], titles: &[&str]) -> ListArgs {
        ListArgs {
            filters: filters.iter().map(|s| s.to_string()).collect(),
            title: titles.iter().map(|s| s.to_string()).collect(),
            page: 1,
            per_page: None,
            output: OutputFormat::Human,
            json: false,
        }
    }

    #[test]
    fn filter_flags_build_filter_set() {
        let filter = list(
            &["lumisection__run__run_number__in=297057, 297100", "entries__gte=10"],
            &["Tracking/hits"],
        )
        .filter()
        .unwrap();
        assert_eq!(filter.run_number_in, vec![297057, 297100]);
        assert_eq!(filter.entries_gte, Some(10));
        assert_eq!(filter.title, vec!["Tracking/hits".to_string()]);
    }

    #[test]
    fn filter_without_equals_is_rejected() {
        let err = list(&["entries__gte"], &[]).filter().unwrap_err();
        assert!(err.to_string().contains("LOOKUP=VALUE"));
    }

    #[test]
    fn unknown_lookup_is_rejected() {
        assert!(list(&["colour=red"], &[]).filter().is_err());
    }
}
