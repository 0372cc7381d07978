//! Curated tables shipped with the crate. A reference-data file can extend or replace them.

use crate::domain::OwnerCode;

/// Company name keyword → ticker, highest priority first.
/// Longer, more specific names come before shorter ones that they contain.
pub const COMPANY_TICKERS: &[(&str, &str)] = &[
    ("berkshire hathaway class b", "BRK-B"),
    ("berkshire hathaway class a", "BRK-A"),
    ("berkshire hathaway", "BRK-B"),
    ("alphabet class c", "GOOG"),
    ("alphabet", "GOOGL"),
    ("google", "GOOGL"),
    ("apple", "AAPL"),
    ("microsoft", "MSFT"),
    ("amazon com", "AMZN"),
    ("amazon", "AMZN"),
    ("meta platforms", "META"),
    ("facebook", "META"),
    ("nvidia", "NVDA"),
    ("tesla", "TSLA"),
    ("netflix", "NFLX"),
    ("advanced micro devices", "AMD"),
    ("intel", "INTC"),
    ("cisco systems", "CSCO"),
    ("oracle", "ORCL"),
    ("salesforce", "CRM"),
    ("adobe", "ADBE"),
    ("qualcomm", "QCOM"),
    ("broadcom", "AVGO"),
    ("texas instruments", "TXN"),
    ("international business machines", "IBM"),
    ("paypal", "PYPL"),
    ("visa", "V"),
    ("mastercard", "MA"),
    ("jpmorgan chase", "JPM"),
    ("bank of america", "BAC"),
    ("wells fargo", "WFC"),
    ("goldman sachs", "GS"),
    ("morgan stanley", "MS"),
    ("citigroup", "C"),
    ("american express", "AXP"),
    ("charles schwab", "SCHW"),
    ("blackrock", "BLK"),
    ("johnson johnson", "JNJ"),
    ("pfizer", "PFE"),
    ("merck", "MRK"),
    ("abbvie", "ABBV"),
    ("eli lilly", "LLY"),
    ("unitedhealth", "UNH"),
    ("bristol myers squibb", "BMY"),
    ("moderna", "MRNA"),
    ("cvs health", "CVS"),
    ("exxon mobil", "XOM"),
    ("chevron", "CVX"),
    ("conocophillips", "COP"),
    ("walmart", "WMT"),
    ("costco", "COST"),
    ("home depot", "HD"),
    ("procter gamble", "PG"),
    ("coca cola", "KO"),
    ("pepsico", "PEP"),
    ("mcdonalds", "MCD"),
    ("nike", "NKE"),
    ("starbucks", "SBUX"),
    ("walt disney", "DIS"),
    ("disney", "DIS"),
    ("comcast", "CMCSA"),
    ("verizon", "VZ"),
    ("at t", "T"),
    ("boeing", "BA"),
    ("lockheed martin", "LMT"),
    ("raytheon", "RTX"),
    ("general dynamics", "GD"),
    ("northrop grumman", "NOC"),
    ("caterpillar", "CAT"),
    ("deere", "DE"),
    ("general electric", "GE"),
    ("honeywell", "HON"),
    ("3m", "MMM"),
    ("united parcel service", "UPS"),
    ("fedex", "FDX"),
    ("ford motor", "F"),
    ("general motors", "GM"),
    ("nextera energy", "NEE"),
    ("duke energy", "DUK"),
    ("american tower", "AMT"),
    ("realty income", "O"),
    ("taiwan semiconductor", "TSM"),
    ("alibaba", "BABA"),
    ("nestle", "NSRGY"),
];

/// Irregular symbols seen in filings mapped to their current form.
pub const TICKER_ALIASES: &[(&str, &str)] = &[
    ("FB", "META"),
    ("BRKB", "BRK-B"),
    ("BRKA", "BRK-A"),
    ("BFB", "BF-B"),
    ("GOOGLE", "GOOGL"),
    ("RTN", "RTX"),
    ("UTX", "RTX"),
    ("ANTM", "ELV"),
];

/// Tokens that match the ticker format but are never tickers in these filings.
pub const EXCLUDED_TOKENS: &[&str] = &[
    "N/A", "NA", "NONE", "NULL", "UNK", "TBD",
    "INC", "CORP", "CO", "LLC", "LTD", "PLC", "LP", "THE", "AND", "OF",
    "SA", "AG", "SE", "NV", "BV", "AB", "AS", "ASA", "SPA", "OY", "OYJ", "KK", "SAS",
    "SARL", "SRL", "KGAA", "LTDA", "PTY", "BHD", "TBK",
    "CLASS", "COM", "COMMON", "STOCK", "SHARES", "ETF", "FUND", "TRUST", "BOND", "NOTE",
    "CASH", "USD", "ADR", "ADS", "REIT", "NYSE", "NASDAQ", "OTC",
    "SP", "JT", "DC",
    "P", "S", "E",
];

/// Tickers whose share classes are written as `ROOT-X`.
pub const SHARE_CLASS_ROOTS: &[&str] = &["BRK", "BF", "LEN", "HEI", "MOG", "CWEN", "LGF"];

pub const ETF_TICKERS: &[&str] = &[
    "SPY", "IVV", "VOO", "VTI", "QQQ", "IWM", "DIA", "EFA", "EEM", "VEA", "VWO", "AGG",
    "BND", "TLT", "IEF", "SHY", "LQD", "HYG", "GLD", "SLV", "XLK", "XLF", "XLE", "XLV",
    "XLI", "XLY", "XLP", "XLU", "XLB", "XLRE", "VNQ", "ARKK", "SCHD", "VIG", "VYM",
];

pub const ETF_KEYWORDS: &[&str] = &[
    "etf",
    "exchange traded",
    "ishares",
    "spdr",
    "invesco qqq",
    "select sector",
    "index fund",
];

pub const NASDAQ_TICKERS: &[&str] = &[
    "AAPL", "MSFT", "AMZN", "GOOGL", "GOOG", "META", "NVDA", "TSLA", "NFLX", "AMD", "INTC",
    "CSCO", "ADBE", "QCOM", "AVGO", "TXN", "PYPL", "COST", "PEP", "SBUX", "CMCSA", "MRNA",
    "SCHW", "QQQ", "HON",
];

pub const TICKER_SECTORS: &[(&str, &str)] = &[
    ("AAPL", "Information Technology"),
    ("MSFT", "Information Technology"),
    ("NVDA", "Information Technology"),
    ("AMD", "Information Technology"),
    ("INTC", "Information Technology"),
    ("CSCO", "Information Technology"),
    ("ORCL", "Information Technology"),
    ("CRM", "Information Technology"),
    ("ADBE", "Information Technology"),
    ("QCOM", "Information Technology"),
    ("AVGO", "Information Technology"),
    ("TXN", "Information Technology"),
    ("IBM", "Information Technology"),
    ("TSM", "Information Technology"),
    ("GOOGL", "Communication Services"),
    ("GOOG", "Communication Services"),
    ("META", "Communication Services"),
    ("NFLX", "Communication Services"),
    ("DIS", "Communication Services"),
    ("CMCSA", "Communication Services"),
    ("VZ", "Communication Services"),
    ("T", "Communication Services"),
    ("AMZN", "Consumer Discretionary"),
    ("TSLA", "Consumer Discretionary"),
    ("HD", "Consumer Discretionary"),
    ("MCD", "Consumer Discretionary"),
    ("NKE", "Consumer Discretionary"),
    ("SBUX", "Consumer Discretionary"),
    ("F", "Consumer Discretionary"),
    ("GM", "Consumer Discretionary"),
    ("BABA", "Consumer Discretionary"),
    ("WMT", "Consumer Staples"),
    ("COST", "Consumer Staples"),
    ("PG", "Consumer Staples"),
    ("KO", "Consumer Staples"),
    ("PEP", "Consumer Staples"),
    ("NSRGY", "Consumer Staples"),
    ("JPM", "Financials"),
    ("BAC", "Financials"),
    ("WFC", "Financials"),
    ("GS", "Financials"),
    ("MS", "Financials"),
    ("C", "Financials"),
    ("AXP", "Financials"),
    ("SCHW", "Financials"),
    ("BLK", "Financials"),
    ("BRK-A", "Financials"),
    ("BRK-B", "Financials"),
    ("V", "Financials"),
    ("MA", "Financials"),
    ("PYPL", "Financials"),
    ("JNJ", "Health Care"),
    ("PFE", "Health Care"),
    ("MRK", "Health Care"),
    ("ABBV", "Health Care"),
    ("LLY", "Health Care"),
    ("UNH", "Health Care"),
    ("BMY", "Health Care"),
    ("MRNA", "Health Care"),
    ("CVS", "Health Care"),
    ("XOM", "Energy"),
    ("CVX", "Energy"),
    ("COP", "Energy"),
    ("BA", "Industrials"),
    ("LMT", "Industrials"),
    ("RTX", "Industrials"),
    ("GD", "Industrials"),
    ("NOC", "Industrials"),
    ("CAT", "Industrials"),
    ("DE", "Industrials"),
    ("GE", "Industrials"),
    ("HON", "Industrials"),
    ("MMM", "Industrials"),
    ("UPS", "Industrials"),
    ("FDX", "Industrials"),
    ("NEE", "Utilities"),
    ("DUK", "Utilities"),
    ("AMT", "Real Estate"),
    ("O", "Real Estate"),
];

/// Name keyword → sector, used when the ticker table has no entry.
pub const SECTOR_KEYWORDS: &[(&str, &str)] = &[
    ("semiconductor", "Information Technology"),
    ("software", "Information Technology"),
    ("technologies", "Information Technology"),
    ("pharmaceutical", "Health Care"),
    ("therapeutics", "Health Care"),
    ("biotech", "Health Care"),
    ("health", "Health Care"),
    ("medical", "Health Care"),
    ("bank", "Financials"),
    ("bancorp", "Financials"),
    ("financial", "Financials"),
    ("insurance", "Financials"),
    ("energy", "Energy"),
    ("petroleum", "Energy"),
    ("oil", "Energy"),
    ("utilities", "Utilities"),
    ("electric", "Utilities"),
    ("realty", "Real Estate"),
    ("properties", "Real Estate"),
    ("aerospace", "Industrials"),
    ("defense", "Industrials"),
    ("airlines", "Industrials"),
    ("railroad", "Industrials"),
    ("communications", "Communication Services"),
    ("media", "Communication Services"),
    ("entertainment", "Communication Services"),
    ("foods", "Consumer Staples"),
    ("beverage", "Consumer Staples"),
    ("retail", "Consumer Discretionary"),
    ("motors", "Consumer Discretionary"),
    ("chemicals", "Materials"),
    ("mining", "Materials"),
    ("steel", "Materials"),
];

/// Owner synonyms in priority order; the first fuzzy hit wins ties.
pub const OWNER_SYNONYMS: &[(&str, OwnerCode)] = &[
    ("SP", OwnerCode::Spouse),
    ("SPOUSE", OwnerCode::Spouse),
    ("WIFE", OwnerCode::Spouse),
    ("HUSBAND", OwnerCode::Spouse),
    ("JT", OwnerCode::Joint),
    ("JOINT", OwnerCode::Joint),
    ("JOINT ACCOUNT", OwnerCode::Joint),
    ("JOINT TENANCY", OwnerCode::Joint),
    ("DC", OwnerCode::DependentChild),
    ("DEPENDENT CHILD", OwnerCode::DependentChild),
    ("DEPENDENT", OwnerCode::DependentChild),
    ("CHILD", OwnerCode::DependentChild),
    ("C", OwnerCode::Filer),
    ("SELF", OwnerCode::Filer),
    ("CONGRESSMAN", OwnerCode::Filer),
    ("CONGRESSWOMAN", OwnerCode::Filer),
    ("MEMBER", OwnerCode::Filer),
    ("FILER", OwnerCode::Filer),
    ("SENATOR", OwnerCode::Filer),
    ("REPRESENTATIVE", OwnerCode::Filer),
];
